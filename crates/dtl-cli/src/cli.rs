use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "dtl",
    about = "Document Trust Ledger: signed documents anchored in a proof-of-work chain",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Data directory (keys, uploads, database, chain)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Proof-of-work difficulty used when a new chain is created
    #[arg(long, global = true)]
    pub difficulty: Option<usize>,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the SHA-256 digest of a file
    Digest(DigestArgs),
    /// Generate a key pair and certificate for a user
    Enroll(EnrollArgs),
    /// Show or verify a user's certificate
    Cert(CertArgs),
    /// Sign a file with a user's private key
    Sign(SignArgs),
    /// Verify a detached signature over a file
    Verify(VerifyArgs),
    /// Upload, sign, verify and register documents
    Document(DocumentArgs),
    /// Inspect and extend the ledger
    Chain(ChainArgs),
    /// Start the HTTP server
    Serve(ServeArgs),
}

#[derive(Args)]
pub struct DigestArgs {
    pub file: PathBuf,
}

#[derive(Args)]
pub struct EnrollArgs {
    #[arg(long)]
    pub user: String,
    #[arg(long)]
    pub username: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub organization: Option<String>,
}

#[derive(Args)]
pub struct CertArgs {
    #[command(subcommand)]
    pub action: CertAction,
}

#[derive(Subcommand)]
pub enum CertAction {
    Show {
        #[arg(long)]
        user: String,
    },
    Verify {
        #[arg(long)]
        user: String,
    },
}

#[derive(Args)]
pub struct SignArgs {
    #[arg(long)]
    pub user: String,
    pub file: PathBuf,
}

#[derive(Args)]
pub struct VerifyArgs {
    #[arg(long)]
    pub user: String,
    pub file: PathBuf,
    /// Hex-encoded signature
    pub signature: String,
}

#[derive(Args)]
pub struct DocumentArgs {
    #[command(subcommand)]
    pub action: DocumentAction,
}

#[derive(Subcommand)]
pub enum DocumentAction {
    Upload {
        #[arg(long)]
        user: String,
        file: PathBuf,
        #[arg(long)]
        encrypt: bool,
    },
    List {
        #[arg(long)]
        user: String,
    },
    Show {
        id: String,
    },
    Sign {
        #[arg(long)]
        user: String,
        id: String,
    },
    Verify {
        id: String,
    },
    Register {
        #[arg(long)]
        user: String,
        id: String,
    },
}

#[derive(Args)]
pub struct ChainArgs {
    #[command(subcommand)]
    pub action: ChainAction,
}

#[derive(Subcommand)]
pub enum ChainAction {
    /// Create the chain file if it does not exist
    Init,
    /// Print the whole chain
    Show,
    /// Print one block
    Block { index: u64 },
    /// Stage a registration of a file's digest without mining
    Stage {
        #[arg(long)]
        user: String,
        #[arg(long)]
        document_id: String,
        file: PathBuf,
    },
    /// Mine all pending transactions into one block
    Mine,
    /// Check chain integrity
    Validate {
        /// List every violation instead of a single verdict
        #[arg(long)]
        report: bool,
    },
    /// Print chain statistics
    Stats,
    /// Print the ledger history of a document
    History { document_id: String },
}

#[derive(Args)]
pub struct ServeArgs {
    #[arg(long)]
    pub bind: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_digest() {
        let cli = Cli::try_parse_from(["dtl", "digest", "a.txt"]).unwrap();
        if let Command::Digest(args) = cli.command {
            assert_eq!(args.file, PathBuf::from("a.txt"));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_enroll() {
        let cli = Cli::try_parse_from(["dtl", "enroll", "--user", "u1", "--email", "a@x"]).unwrap();
        if let Command::Enroll(args) = cli.command {
            assert_eq!(args.user, "u1");
            assert_eq!(args.email, Some("a@x".into()));
            assert_eq!(args.username, None);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_cert_verify() {
        let cli = Cli::try_parse_from(["dtl", "cert", "verify", "--user", "u1"]).unwrap();
        if let Command::Cert(args) = cli.command {
            assert!(matches!(args.action, CertAction::Verify { .. }));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_verify_signature() {
        let cli = Cli::try_parse_from(["dtl", "verify", "--user", "u1", "a.txt", "abcd"]).unwrap();
        if let Command::Verify(args) = cli.command {
            assert_eq!(args.signature, "abcd");
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_document_upload() {
        let cli = Cli::try_parse_from(["dtl", "document", "upload", "--user", "u1", "--encrypt", "a.pdf"]).unwrap();
        if let Command::Document(args) = cli.command {
            assert!(matches!(args.action, DocumentAction::Upload { encrypt: true, .. }));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_chain_block() {
        let cli = Cli::try_parse_from(["dtl", "chain", "block", "3"]).unwrap();
        if let Command::Chain(args) = cli.command {
            assert!(matches!(args.action, ChainAction::Block { index: 3 }));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_chain_stage() {
        let cli = Cli::try_parse_from([
            "dtl", "chain", "stage", "--user", "u1", "--document-id", "d1", "a.txt",
        ])
        .unwrap();
        if let Command::Chain(args) = cli.command {
            if let ChainAction::Stage { user, document_id, file } = args.action {
                assert_eq!(user, "u1");
                assert_eq!(document_id, "d1");
                assert_eq!(file, PathBuf::from("a.txt"));
            } else { panic!("wrong action"); }
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_globals() {
        let cli = Cli::try_parse_from([
            "dtl", "--data-dir", "/tmp/dtl", "--difficulty", "1", "--format", "json", "chain", "stats",
        ])
        .unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/dtl")));
        assert_eq!(cli.difficulty, Some(1));
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn parse_validate_report() {
        let cli = Cli::try_parse_from(["dtl", "chain", "validate", "--report"]).unwrap();
        if let Command::Chain(args) = cli.command {
            assert!(matches!(args.action, ChainAction::Validate { report: true }));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_serve() {
        let cli = Cli::try_parse_from(["dtl", "serve", "--bind", "0.0.0.0:8080"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.bind, Some("0.0.0.0:8080".into()));
        } else { panic!("wrong command"); }
    }
}
