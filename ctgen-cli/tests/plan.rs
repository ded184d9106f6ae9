use predicates::prelude::*;

mod common;

use common::{TestContext, image_json};

fn context() -> TestContext {
    let ctx = TestContext::new();
    ctx.write_vendor("debian.yaml");
    ctx.write_config(
        &format!(
            "[{}, {}]",
            image_json(9001, "debian-12.qcow2", "https://example.org/debian.qcow2", "debian.yaml"),
            image_json(9002, "alma-9.qcow2", "https://example.org/alma.qcow2", "alma.yaml"),
        ),
        r#"[{"name": "Create VM", "command": "qm create {{.ID}} --name {{.Name}}"}]"#,
    );
    ctx
}

#[test]
fn test_plan_lists_every_image() {
    let ctx = context();
    ctx.cmd()
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("qm create 9001 --name debian-12.qcow2"))
        .stdout(predicate::str::contains("qm create 9002 --name alma-9.qcow2"))
        .stdout(predicate::str::contains("alma.yaml is missing"));
}

#[test]
fn test_plan_single_target() {
    let ctx = context();
    ctx.cmd()
        .args(["plan", "alma-9.qcow2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("qm create 9002"))
        .stdout(predicate::str::contains("qm create 9001").not());
}

#[test]
fn test_plan_unknown_target() {
    let ctx = context();
    ctx.cmd()
        .args(["plan", "nope.qcow2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.qcow2: not found"));
}

#[test]
fn test_plan_uses_configured_cloudinit_dir() {
    let ctx = context();
    let vendors = ctx.path("vendors");
    std::fs::create_dir_all(&vendors).unwrap();
    std::fs::write(vendors.join("alma.yaml"), "#cloud-config\n").unwrap();

    ctx.cmd()
        .env("CTGEN_CLOUDINIT_DIR", &vendors)
        .env("CTGEN_STAGING_FILE", ctx.path("work/disk.qcow2"))
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("alma.yaml is missing").not())
        .stdout(predicate::str::contains("vendors/debian.yaml is missing"))
        .stdout(predicate::str::contains("work/disk.qcow2"));
}

#[test]
fn test_plan_reads_yaml() {
    let ctx = TestContext::new();
    let images = ctx.path("config/images.yaml");
    let steps = ctx.path("config/steps.yml");
    std::fs::write(
        &images,
        "- id: 9100\n  name: fedora.qcow2\n  url: https://example.org/fedora.qcow2\n  vendor: fedora.yaml\n",
    )
    .unwrap();
    std::fs::write(&steps, "- name: Resize\n  command: qemu-img resize {{.FilePath}} 8G\n").unwrap();

    ctx.cmd()
        .arg("plan")
        .arg("--images")
        .arg(&images)
        .arg("--steps")
        .arg(&steps)
        .assert()
        .success()
        .stdout(predicate::str::contains("fedora.qcow2 (id 9100, vendor fedora.yaml)"))
        .stdout(predicate::str::contains("qemu-img resize"));
}

#[rstest::rstest]
#[case("debian-12.qcow2", "qm create 9001 --name debian-12.qcow2")]
#[case("alma-9.qcow2", "qm create 9002 --name alma-9.qcow2")]
fn test_plan_substitutes_per_target(#[case] target: &str, #[case] expected: &str) {
    let ctx = context();
    ctx.cmd()
        .args(["plan", target])
        .assert()
        .success()
        .stdout(predicate::str::contains(expected));
}
