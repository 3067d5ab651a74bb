use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use super::request::OutputFormat;

/// Argument vector for `smime -sign`.
///
/// Every option value is its own argument; nothing is ever joined into a
/// shell string, so paths and passphrases may contain spaces.
#[derive(Clone, PartialEq, Eq)]
pub struct SmimeCommand {
    cert: PathBuf,
    key: PathBuf,
    output_format: OutputFormat,
    password: Option<String>,
    opaque: bool,
}

impl SmimeCommand {
    pub fn new(cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        Self {
            cert: cert.into(),
            key: key.into(),
            output_format: OutputFormat::default(),
            password: None,
            opaque: false,
        }
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn password(mut self, password: Option<String>) -> Self {
        self.password = password.filter(|p| !p.is_empty());
        self
    }

    pub fn opaque(mut self, opaque: bool) -> Self {
        self.opaque = opaque;
        self
    }

    pub fn cert(&self) -> &Path {
        &self.cert
    }

    pub fn key(&self) -> &Path {
        &self.key
    }

    /// Arguments following the program name.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "smime".into(),
            "-sign".into(),
            "-signer".into(),
            self.cert.clone().into_os_string(),
            "-inkey".into(),
            self.key.clone().into_os_string(),
            "-outform".into(),
            self.output_format.as_arg().into(),
        ];

        if let Some(ref password) = self.password {
            args.push("-passin".into());
            args.push(format!("pass:{password}").into());
        }
        if self.opaque {
            args.push("-nodetach".into());
        }

        args
    }
}

impl fmt::Debug for SmimeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmimeCommand")
            .field("cert", &self.cert)
            .field("key", &self.key)
            .field("output_format", &self.output_format)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("opaque", &self.opaque)
            .finish()
    }
}
