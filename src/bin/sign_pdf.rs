//! Sign a PDF with a PKCS#12 certificate and a visible signature box.
//!
//! Usage:
//!   sign_pdf --signCert signer.p12 --signPass secret --signName Signature1 \
//!     --signRecX 36 --signRecY 36 --signRecWidth 200 --signRecHeight 60 \
//!     --signText "Approved" --srcPdf document.pdf
//!
//! Prints the path of the signed copy on stdout.

use clap::Parser;
use pdf_autograph::{sign_document, Error, Rect, SignatureRequest, SignerConfig};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "sign_pdf",
    version,
    about = "Add a visible PKCS#7 signature to page 1 of a PDF",
    allow_negative_numbers = true
)]
struct Cli {
    /// PKCS#12 file holding the signing key and certificate chain
    #[arg(long = "signCert")]
    sign_cert: PathBuf,

    /// Name of the signature field
    #[arg(long = "signName")]
    sign_name: String,

    /// Password of the PKCS#12 file
    #[arg(long = "signPass")]
    sign_pass: String,

    /// Height of the signature box in points
    #[arg(long = "signRecHeight")]
    sign_rec_height: i32,

    /// Width of the signature box in points
    #[arg(long = "signRecWidth")]
    sign_rec_width: i32,

    /// X coordinate of the lower-left corner
    #[arg(long = "signRecX")]
    sign_rec_x: i32,

    /// Y coordinate of the lower-left corner
    #[arg(long = "signRecY")]
    sign_rec_y: i32,

    /// Text shown in the signature box
    #[arg(long = "signText")]
    sign_text: String,

    /// PDF to sign (left unchanged)
    #[arg(long = "srcPdf")]
    src_pdf: PathBuf,

    /// Bytes reserved for the signature container
    #[arg(long, default_value_t = pdf_autograph::config::DEFAULT_MAX_SIGNATURE_SIZE)]
    max_signature_size: usize,

    /// Directory for the signed copy (default: system temp dir)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Reason for signing
    #[arg(long)]
    reason: Option<String>,

    /// Location of signing
    #[arg(long)]
    location: Option<String>,

    /// Print `{"output": "<path>"}` instead of the bare path
    #[arg(long)]
    json: bool,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(serde::Serialize)]
struct SignJson {
    output: String,
}

impl Cli {
    fn request(&self) -> SignatureRequest {
        SignatureRequest::new(
            self.sign_name.clone(),
            self.sign_text.clone(),
            Rect::from_ints(self.sign_rec_x, self.sign_rec_y, self.sign_rec_width, self.sign_rec_height),
            self.src_pdf.clone(),
            self.sign_cert.clone(),
            self.sign_pass.clone(),
        )
    }

    fn config(&self) -> SignerConfig {
        let mut config = SignerConfig::new().with_max_signature_size(self.max_signature_size);
        if let Some(dir) = &self.output_dir {
            config = config.with_output_dir(dir);
        }
        if let Some(reason) = &self.reason {
            config = config.with_reason(reason);
        }
        if let Some(location) = &self.location {
            config = config.with_location(location);
        }
        config
    }
}

fn run(cli: &Cli) -> Result<String, Error> {
    let output = sign_document(&cli.request(), &cli.config())?;
    let output = output.display().to_string();
    if cli.json {
        serde_json::to_string(&SignJson { output })
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))
    } else {
        Ok(output)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stderr)
        .init();

    match run(&cli) {
        Ok(line) => {
            println!("{}", line);
            ExitCode::SUCCESS
        },
        Err(e) => {
            eprintln!("error ({}): {}", e.kind(), e);
            ExitCode::FAILURE
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_original_option_names() {
        let cli = Cli::try_parse_from([
            "sign_pdf",
            "--signCert",
            "signer.p12",
            "--signName",
            "Sig1",
            "--signPass",
            "secret",
            "--signRecHeight",
            "60",
            "--signRecWidth",
            "200",
            "--signRecX",
            "-5",
            "--signRecY",
            "36",
            "--signText",
            "Approved",
            "--srcPdf",
            "in.pdf",
        ])
        .unwrap();
        let request = cli.request();
        assert_eq!(request.field_name, "Sig1");
        assert_eq!(request.rect, Rect::from_ints(-5, 36, 200, 60));
        assert_eq!(cli.config().max_signature_size, 8192);
        assert!(!cli.json);
    }

    #[test]
    fn test_all_original_options_are_required() {
        let result = Cli::try_parse_from(["sign_pdf", "--signCert", "signer.p12", "--srcPdf", "in.pdf"]);
        assert!(result.is_err());
    }
}
