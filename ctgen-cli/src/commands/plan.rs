use clap::Args;
use comfy_table::{Table, presets};
use ctgen::constants::static_steps;
use ctgen::exec::CommandSpec;
use ctgen::{ImageSpec, StepContext, StepSpec};

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Only show these images (by name)
    pub targets: Vec<String>,
}

pub async fn execute(args: PlanArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let (images, steps) = global.load_config()?;
    let staging = global.staging_file();
    let cloudinit_dir = global.cloudinit_dir();

    let mut errors = Vec::new();
    let mut shown = 0;

    for target in &args.targets {
        if !images.iter().any(|img| &img.name == target) {
            eprintln!("Error: No such image: {}", target);
            errors.push(format!("{}: not found", target));
        }
    }

    for image in images
        .iter()
        .filter(|img| args.targets.is_empty() || args.targets.contains(&img.name))
    {
        println!("{}", render_plan(image, &steps, &staging));
        if !cloudinit_dir.join(&image.vendor).is_file() {
            println!(
                "  warning: cloud-init source {} is missing\n",
                cloudinit_dir.join(&image.vendor).display()
            );
        }
        shown += 1;
    }

    if !errors.is_empty() {
        anyhow::bail!(
            "Showed {} image(s), {} not found\nErrors:\n  {}",
            shown,
            errors.len(),
            errors.join("\n  ")
        );
    }
    Ok(())
}

/// Table of every step of `image`, in run order, with its command.
pub fn render_plan(image: &ImageSpec, steps: &[StepSpec], staging: &std::path::Path) -> String {
    let context = StepContext::new(image, staging);

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_header(vec!["#", "STEP", "COMMAND"]);

    table.add_row(vec![
        "0".to_string(),
        static_steps::DOWNLOAD.to_string(),
        if image.has_checksum() {
            format!("GET {} (verify via {})", image.url, image.checksum_url)
        } else {
            format!("GET {}", image.url)
        },
    ]);
    table.add_row(vec![
        "1".to_string(),
        static_steps::COPY.to_string(),
        format!("cp <iso dir>/{} {}", image.name, staging.display()),
    ]);
    for (offset, step) in steps.iter().enumerate() {
        let command = CommandSpec::shell(context.substitute(&step.command));
        table.add_row(vec![
            (offset + 2).to_string(),
            step.name.clone(),
            command.display(),
        ]);
    }

    format!("{} (id {}, vendor {})\n{}\n", image.name, image.id, image.vendor, table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_render_plan_substitutes_placeholders() {
        let image = ImageSpec {
            id: 9001,
            name: "debian-12.qcow2".into(),
            url: "https://cloud.debian.org/debian-12-genericcloud-amd64.qcow2".into(),
            checksum_url: String::new(),
            tags: "debian".into(),
            vendor: "debian.yaml".into(),
        };
        let steps = vec![StepSpec {
            name: "Import disk".into(),
            command: "qm importdisk {{.ID}} {{.FilePath}} local-lvm".into(),
        }];

        let plan = render_plan(&image, &steps, Path::new("/work/base.qcow2"));

        assert!(plan.starts_with("debian-12.qcow2 (id 9001, vendor debian.yaml)"));
        assert!(plan.contains("Download/Verify"));
        assert!(plan.contains("Copy Image"));
        assert!(plan.contains("qm importdisk 9001 /work/base.qcow2 local-lvm"));
    }
}
