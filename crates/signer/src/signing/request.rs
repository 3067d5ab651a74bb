use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;

use super::content::Content;

/// Encoding of the PKCS#7 structure written by the signing tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum OutputFormat {
    Smime,
    #[default]
    Pem,
    Der,
}

impl OutputFormat {
    /// Value passed to `-outform`.
    pub fn as_arg(&self) -> &'static str {
        match self {
            OutputFormat::Smime => "SMIME",
            OutputFormat::Pem => "PEM",
            OutputFormat::Der => "DER",
        }
    }

    /// Media type used when the signed output is served over HTTP.
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Smime => "message/rfc822",
            OutputFormat::Pem => "application/x-pem-file",
            OutputFormat::Der => "application/pkcs7-mime",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SMIME" => Ok(OutputFormat::Smime),
            "PEM" => Ok(OutputFormat::Pem),
            "DER" => Ok(OutputFormat::Der),
            _ => Err(format!("unknown output format {s:?} (expected SMIME, PEM or DER)")),
        }
    }
}

impl TryFrom<String> for OutputFormat {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Everything needed for one signing call.
///
/// Built with chained setters and moved into
/// [`SigningInvoker::sign`](super::SigningInvoker::sign). Required fields
/// are checked there, before any process is started, so a request missing
/// its content, key or certificate can still be constructed.
#[derive(Default)]
pub struct SignRequest {
    pub(crate) content: Option<Content>,
    pub(crate) key: Option<PathBuf>,
    pub(crate) cert: Option<PathBuf>,
    pub(crate) password: Option<String>,
    pub(crate) output_format: OutputFormat,
    pub(crate) opaque: bool,
}

impl fmt::Debug for SignRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignRequest")
            .field("content", &self.content)
            .field("key", &self.key)
            .field("cert", &self.cert)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("output_format", &self.output_format)
            .field("opaque", &self.opaque)
            .finish()
    }
}

impl SignRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl Into<Content>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Path to the PEM private key handed to `-inkey`.
    pub fn key(mut self, key: impl Into<PathBuf>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Path to the signer certificate handed to `-signer`.
    pub fn cert(mut self, cert: impl Into<PathBuf>) -> Self {
        self.cert = Some(cert.into());
        self
    }

    /// Passphrase for an encrypted key. An empty passphrase is ignored.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Embed the content in the signed structure instead of producing a
    /// detached signature.
    pub fn opaque(mut self, opaque: bool) -> Self {
        self.opaque = opaque;
        self
    }
}
