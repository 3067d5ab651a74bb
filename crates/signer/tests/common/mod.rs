#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

/// Writes an executable `/bin/sh` script that stands in for openssl.
#[cfg(unix)]
pub fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).expect("create fake tool");
    writeln!(file, "#!/bin/sh").unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file.sync_all().unwrap();
    drop(file);
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub fn openssl_available() -> bool {
    Command::new("openssl")
        .arg("version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// Self-signed RSA key and certificate in a temp dir. File names contain
/// spaces on purpose.
pub struct TestCredentials {
    pub dir: TempDir,
    pub key: PathBuf,
    pub cert: PathBuf,
}

pub fn generate_credentials(password: Option<&str>) -> TestCredentials {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let key = dir.path().join("signer key.pem");
    let cert = dir.path().join("signer cert.pem");

    let mut cmd = Command::new("openssl");
    cmd.args(["req", "-x509", "-newkey", "rsa:2048", "-days", "1"])
        .args(["-subj", "/CN=smime-signer test"])
        .arg("-keyout")
        .arg(&key)
        .arg("-out")
        .arg(&cert);
    match password {
        Some(password) => {
            cmd.arg("-passout").arg(format!("pass:{password}"));
        }
        None => {
            cmd.arg("-nodes");
        }
    }

    let out = cmd.output().expect("Failed to run openssl req");
    assert!(
        out.status.success(),
        "openssl req failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );

    TestCredentials { dir, key, cert }
}

/// Runs `openssl smime -verify -noverify` and returns the recovered content.
pub fn verify(signed: &[u8], inform: &str, detached_content: Option<&[u8]>) -> Vec<u8> {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let signed_path = dir.path().join("signed");
    std::fs::write(&signed_path, signed).unwrap();

    let mut cmd = Command::new("openssl");
    cmd.args(["smime", "-verify", "-noverify", "-inform", inform])
        .arg("-in")
        .arg(&signed_path);
    if let Some(content) = detached_content {
        let content_path = dir.path().join("content");
        std::fs::write(&content_path, content).unwrap();
        cmd.arg("-content").arg(content_path);
    }

    let out = cmd.output().expect("Failed to run openssl smime -verify");
    assert!(
        out.status.success(),
        "verification failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    out.stdout
}
