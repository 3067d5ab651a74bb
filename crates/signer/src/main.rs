use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use smime_signer::{
    AppState, Content, Credentials, OutputFormat, SignRequest, SigningInvoker, run,
};
use tokio::io::AsyncWriteExt;
use tracing::info;

#[derive(Debug, Clone, ValueEnum)]
enum Outform {
    Smime,
    Pem,
    Der,
}

impl From<Outform> for OutputFormat {
    fn from(outform: Outform) -> Self {
        match outform {
            Outform::Smime => OutputFormat::Smime,
            Outform::Pem => OutputFormat::Pem,
            Outform::Der => OutputFormat::Der,
        }
    }
}

#[derive(Parser)]
#[clap(name = "smime-sign")]
#[clap(about = "Sign content as PKCS#7/S-MIME using openssl")]
struct Args {
    /// Log filter, e.g. "info" or "smime_signer=debug"
    #[clap(long, env = "SMIME_SIGN_LOG", default_value = "info")]
    log_level: String,
    /// Signing tool to invoke
    #[clap(long, env = "OPENSSL_BIN", default_value = "openssl")]
    openssl: PathBuf,
    /// Kill the signing tool after this many seconds
    #[clap(long, env = "SMIME_SIGN_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(ClapArgs)]
struct CredentialArgs {
    /// Private key (PEM)
    #[clap(short = 'k', long, env = "SIGNING_KEY")]
    key: PathBuf,
    /// Signer certificate (PEM)
    #[clap(short = 'c', long, env = "SIGNING_CERT")]
    cert: PathBuf,
    /// Passphrase for an encrypted private key
    #[clap(long, env = "SIGNING_KEY_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Sign a file (or stdin) and write the result to a file (or stdout)
    Sign {
        #[clap(flatten)]
        credentials: CredentialArgs,
        /// Content to sign; stdin when omitted
        #[clap(short, long)]
        input: Option<PathBuf>,
        /// Where to write the signed output; stdout when omitted
        #[clap(short, long)]
        output: Option<PathBuf>,
        #[clap(long, value_enum, default_value = "pem")]
        outform: Outform,
        /// Embed the content instead of producing a detached signature
        #[clap(long)]
        nodetach: bool,
    },
    /// Serve POST /sign over HTTP
    Serve {
        #[clap(flatten)]
        credentials: CredentialArgs,
        #[clap(long, default_value = "127.0.0.1")]
        host: String,
        #[clap(long, default_value = "3000")]
        port: u16,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    let outcome = runtime.block_on(execute(args));
    // A stdin read abandoned after the tool exited stays parked on the
    // blocking pool; do not wait for it.
    runtime.shutdown_background();
    outcome
}

async fn execute(args: Args) -> Result<()> {
    let mut invoker = SigningInvoker::new().program(args.openssl);
    if let Some(secs) = args.timeout_secs {
        invoker = invoker.timeout(Duration::from_secs(secs));
    }

    match args.command {
        Command::Sign {
            credentials,
            input,
            output,
            outform,
            nodetach,
        } => sign_once(&invoker, credentials, input, output, outform.into(), nodetach).await,
        Command::Serve {
            credentials,
            host,
            port,
        } => {
            let state = AppState {
                invoker,
                credentials: Arc::new(Credentials {
                    key: credentials.key,
                    cert: credentials.cert,
                    password: credentials.password,
                }),
            };
            run(host, port, state).await
        }
    }
}

async fn sign_once(
    invoker: &SigningInvoker,
    credentials: CredentialArgs,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    format: OutputFormat,
    opaque: bool,
) -> Result<()> {
    let content = match input {
        Some(ref path) => Content::from_reader(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening {}", path.display()))?,
        ),
        None => Content::from_reader(tokio::io::stdin()),
    };

    let mut request = SignRequest::new()
        .content(content)
        .key(credentials.key)
        .cert(credentials.cert)
        .output_format(format)
        .opaque(opaque);
    if let Some(password) = credentials.password {
        request = request.password(password);
    }

    let result = invoker.sign(request).await.context("signing content")?;

    match output {
        Some(path) => {
            tokio::fs::write(&path, &result.output)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), bytes = result.output.len(), "signed");
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&result.output).await.context("writing to stdout")?;
            stdout.flush().await.context("flushing stdout")?;
        }
    }

    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_new(level)
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .context("parsing log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .map_err(anyhow::Error::msg)?;
    Ok(())
}
