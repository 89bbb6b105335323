use std::fs;
use std::path::Path;

use anyhow::{bail, Context as _};
use colored::Colorize;
use serde::Serialize;

use dtl_crypto::{digest, Signature, SubjectInfo};
use dtl_ledger::{Block, Transaction};
use dtl_server::{open_trust, DtlServer, ServerConfig};
use dtl_trust::{Document, DocumentTrust};
use dtl_types::{DocumentId, UserId};

use crate::cli::*;

/// Resolved configuration plus the output format for one invocation.
struct Context {
    config: ServerConfig,
    format: OutputFormat,
}

impl Context {
    fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = match &cli.config {
            Some(path) => ServerConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => ServerConfig::default(),
        };
        if let Some(dir) = &cli.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(difficulty) = cli.difficulty {
            config.difficulty = difficulty;
        }
        config.ledger().validate()?;
        Ok(Self {
            config,
            format: cli.format,
        })
    }

    fn trust(&self) -> anyhow::Result<DocumentTrust> {
        Ok(open_trust(&self.config)?)
    }

    /// Print `value` as pretty JSON, or run `text` for human output.
    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce(&T)) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Text => text(value),
        }
        Ok(())
    }
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let ctx = Context::from_cli(&cli)?;
    match cli.command {
        Command::Digest(args) => cmd_digest(&ctx, args),
        Command::Enroll(args) => cmd_enroll(&ctx, args),
        Command::Cert(args) => cmd_cert(&ctx, args),
        Command::Sign(args) => cmd_sign(&ctx, args),
        Command::Verify(args) => cmd_verify(&ctx, args),
        Command::Document(args) => cmd_document(&ctx, args),
        Command::Chain(args) => cmd_chain(&ctx, args),
        Command::Serve(args) => cmd_serve(ctx, args),
    }
}

fn read_file(path: &Path) -> anyhow::Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn user(id: &str) -> anyhow::Result<UserId> {
    let user = UserId::new(id);
    if user.is_blank() {
        bail!("user id must not be blank");
    }
    Ok(user)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[derive(Serialize)]
struct DigestOutput {
    file: String,
    sha256: String,
}

fn cmd_digest(ctx: &Context, args: DigestArgs) -> anyhow::Result<()> {
    let bytes = read_file(&args.file)?;
    let out = DigestOutput {
        file: args.file.display().to_string(),
        sha256: digest(&bytes).to_hex(),
    };
    ctx.emit(&out, |o| println!("{}  {}", o.sha256, o.file))
}

fn cmd_enroll(ctx: &Context, args: EnrollArgs) -> anyhow::Result<()> {
    let trust = ctx.trust()?;
    let subject = SubjectInfo {
        username: args.username,
        email: args.email,
        organization: args.organization,
    };
    let cert = trust.enroll(&user(&args.user)?, &subject)?;
    ctx.emit(&cert, |c| {
        println!("{} Enrolled {}", "✓".green().bold(), c.subject.user_id.to_string().yellow());
        println!("  Serial:     {}", c.serial_number.cyan());
        println!("  Valid until {}", c.validity.not_after.to_rfc3339());
    })
}

fn cmd_cert(ctx: &Context, args: CertArgs) -> anyhow::Result<()> {
    let trust = ctx.trust()?;
    match args.action {
        CertAction::Show { user: id } => {
            let status = trust.certificate_status(&user(&id)?)?;
            ctx.emit(&status, |s| {
                let c = &s.certificate;
                println!("Certificate {}", c.serial_number.cyan());
                println!("  Subject:    {} <{}>", c.subject.username, c.subject.email);
                println!("  Org:        {}", c.subject.organization);
                println!("  Issuer:     {}", c.issuer.common_name);
                println!("  Not before: {}", c.validity.not_before.to_rfc3339());
                println!("  Not after:  {}", c.validity.not_after.to_rfc3339());
                println!("  Public key: {}", c.public_key);
                println!("  Valid:      {}", verdict(s.valid));
            })
        }
        CertAction::Verify { user: id } => {
            let status = trust.certificate_status(&user(&id)?)?;
            ctx.emit(&status.valid, |valid| {
                if *valid {
                    println!("{} Certificate for {} is valid", "✓".green().bold(), id.yellow());
                } else {
                    println!("{} Certificate for {} is not valid", "✗".red().bold(), id.yellow());
                }
            })
        }
    }
}

#[derive(Serialize)]
struct SignatureOutput {
    user: String,
    file: String,
    signature: Signature,
}

fn cmd_sign(ctx: &Context, args: SignArgs) -> anyhow::Result<()> {
    let trust = ctx.trust()?;
    let bytes = read_file(&args.file)?;
    let key = trust.keys().load_private_key(&user(&args.user)?)?;
    let out = SignatureOutput {
        user: args.user,
        file: args.file.display().to_string(),
        signature: key.sign(&bytes)?,
    };
    ctx.emit(&out, |o| println!("{}", o.signature.to_hex()))
}

#[derive(Serialize)]
struct VerifyOutput {
    user: String,
    file: String,
    valid: bool,
}

fn cmd_verify(ctx: &Context, args: VerifyArgs) -> anyhow::Result<()> {
    let trust = ctx.trust()?;
    let bytes = read_file(&args.file)?;
    let key = trust.keys().load_public_key(&user(&args.user)?)?;
    // A malformed signature is a failed verification, not an error.
    let valid = Signature::from_hex(args.signature.trim())
        .map(|sig| key.verify(&bytes, &sig).is_ok())
        .unwrap_or(false);
    let out = VerifyOutput {
        user: args.user,
        file: args.file.display().to_string(),
        valid,
    };
    ctx.emit(&out, |o| println!("Signature: {}", verdict(o.valid)))?;
    if !valid {
        std::process::exit(1);
    }
    Ok(())
}

fn print_document(doc: &Document) {
    println!("{} {}", doc.id.to_string().yellow(), doc.original_name.bold());
    println!("  Owner:    {}", doc.user_id);
    println!("  SHA-256:  {}", doc.hash.to_hex());
    println!("  Size:     {} bytes{}", doc.size, if doc.encrypted { " (encrypted)" } else { "" });
    println!("  Uploaded: {}", doc.uploaded_at.to_rfc3339());
    match doc.signed_at {
        Some(at) if doc.signed => println!("  Signed:   {}", at.to_rfc3339()),
        _ => println!("  Signed:   {}", "no".dimmed()),
    }
    match doc.ledger_block_index {
        Some(index) if doc.registered_in_ledger => println!("  Ledger:   block #{index}"),
        _ => println!("  Ledger:   {}", "not registered".dimmed()),
    }
}

fn cmd_document(ctx: &Context, args: DocumentArgs) -> anyhow::Result<()> {
    let trust = ctx.trust()?;
    match args.action {
        DocumentAction::Upload { user: id, file, encrypt } => {
            let bytes = read_file(&file)?;
            let doc = trust.upload(&user(&id)?, &file_name(&file), &bytes, encrypt)?;
            ctx.emit(&doc, |d| {
                println!("{} Uploaded {}", "✓".green().bold(), d.id.to_string().yellow());
                println!("  SHA-256: {}", d.hash.to_hex());
            })
        }
        DocumentAction::List { user: id } => {
            let docs = trust.documents_for(&user(&id)?)?;
            ctx.emit(&docs, |docs| {
                if docs.is_empty() {
                    println!("No documents.");
                }
                for d in docs {
                    let state = match (d.signed, d.registered_in_ledger) {
                        (_, true) => "registered".green(),
                        (true, false) => "signed".cyan(),
                        _ => "uploaded".normal(),
                    };
                    println!("{}  {:<10}  {}", d.id.short_id().yellow(), state, d.original_name);
                }
            })
        }
        DocumentAction::Show { id } => {
            let doc = trust.document(&DocumentId::new(id))?;
            ctx.emit(&doc, print_document)
        }
        DocumentAction::Sign { user: uid, id } => {
            let receipt = trust.sign(&user(&uid)?, &DocumentId::new(id))?;
            ctx.emit(&receipt, |r| {
                println!("{} Signed {}", "✓".green().bold(), r.document_id.to_string().yellow());
                println!("  Signature: {}", r.signature.to_hex());
            })
        }
        DocumentAction::Verify { id } => {
            let report = trust.verify(&DocumentId::new(id))?;
            ctx.emit(&report, |r| {
                println!("Document {}", r.document_id.to_string().yellow());
                println!("  Signature: {}", verdict(r.signature_valid));
                println!("  Content:   {}", verdict(r.hash_valid));
                println!("  Signed by: {}", r.signed_by);
            })
        }
        DocumentAction::Register { user: uid, id } => {
            let registration = trust.register(&user(&uid)?, &DocumentId::new(id))?;
            ctx.emit(&registration, |r| {
                println!(
                    "{} Registered {} in block #{}",
                    "✓".green().bold(),
                    r.document.id.to_string().yellow(),
                    r.block_index
                );
                println!("  Block hash: {}", r.block_hash.to_hex().cyan());
            })
        }
    }
}

fn verdict(ok: bool) -> colored::ColoredString {
    if ok {
        "valid".green().bold()
    } else {
        "INVALID".red().bold()
    }
}

fn print_block(block: &Block) {
    println!(
        "Block #{} {}",
        block.index.to_string().bold(),
        block.hash.to_hex().cyan()
    );
    println!("  Previous: {}", block.previous_hash);
    println!("  Time:     {} ms", block.timestamp);
    println!("  Nonce:    {}", block.nonce);
    let transactions = block.transactions();
    if transactions.is_empty() {
        println!("  (no transactions)");
    }
    for tx in transactions {
        println!(
            "  {} {} by {}",
            tx.document_id.short_id().yellow(),
            tx.document_name,
            tx.user_id
        );
    }
}

fn cmd_chain(ctx: &Context, args: ChainArgs) -> anyhow::Result<()> {
    let trust = ctx.trust()?;
    let ledger = trust.ledger();
    match args.action {
        ChainAction::Init => {
            let stats = ledger.stats()?;
            ctx.emit(&stats, |s| {
                println!(
                    "{} Chain at {} ({} blocks, difficulty {})",
                    "✓".green().bold(),
                    ctx.config.chain_path().display(),
                    s.total_blocks,
                    s.difficulty
                );
            })
        }
        ChainAction::Show => {
            let snapshot = ledger.snapshot()?;
            ctx.emit(&snapshot, |s| {
                for block in &s.chain {
                    print_block(block);
                }
                if !s.pending_transactions.is_empty() {
                    println!("{} pending transaction(s)", s.pending_transactions.len());
                }
            })
        }
        ChainAction::Block { index } => {
            let block = ledger.block(index)?;
            ctx.emit(&block, print_block)
        }
        ChainAction::Stage { user: uid, document_id, file } => {
            let signer = user(&uid)?;
            let bytes = read_file(&file)?;
            let signature = trust.keys().load_private_key(&signer)?.sign(&bytes)?;
            let tx = Transaction::document_registration(
                DocumentId::new(document_id),
                file_name(&file),
                digest(&bytes),
                signer,
                signature,
            );
            ledger.stage_transaction(tx.clone())?;
            ctx.emit(&tx, |t| {
                println!("{} Staged {}", "✓".green().bold(), t.document_id.to_string().yellow());
            })
        }
        ChainAction::Mine => {
            let mined = ledger.mine_pending_transactions()?.unwrap_or_default();
            let block = ledger.latest_block()?;
            ctx.emit(&mined, |txs| {
                if txs.is_empty() {
                    println!("Nothing to mine.");
                } else {
                    println!(
                        "{} Mined {} transaction(s) into block #{}",
                        "✓".green().bold(),
                        txs.len(),
                        block.index
                    );
                }
            })
        }
        ChainAction::Validate { report } => {
            let valid = if report {
                let report = ledger.validation_report()?;
                let valid = report.is_valid();
                ctx.emit(&report, |r| {
                    println!("Blocks: {}  Difficulty: {}", r.block_count, r.difficulty);
                    if !r.genesis_consistent {
                        println!("  {} genesis block does not match its hash", "!".yellow());
                    }
                    for v in &r.violations {
                        println!("  {} block #{}: {}", "✗".red(), v.index, v.description);
                    }
                    println!("Chain: {}", verdict(r.is_valid()));
                })?;
                valid
            } else {
                let status = ledger.validity()?;
                let valid = status.valid;
                ctx.emit(&status, |s| println!("Chain: {} ({})", verdict(s.valid), s.message))?;
                valid
            };
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        ChainAction::Stats => {
            let stats = ledger.stats()?;
            ctx.emit(&stats, |s| {
                println!("Blocks:     {}", s.total_blocks);
                println!("Difficulty: {}", s.difficulty);
                println!("Pending:    {}", s.pending_transactions);
                println!("Valid:      {}", verdict(s.is_valid));
                println!("Latest:     #{} {}", s.latest_block.index, s.latest_block.hash.short_hex());
            })
        }
        ChainAction::History { document_id } => {
            let history = trust.history(&DocumentId::new(document_id))?;
            ctx.emit(&history, |h| {
                if h.is_empty() {
                    println!("No ledger entries.");
                }
                for view in h {
                    println!(
                        "block #{} {}  {} signed by {}",
                        view.block_index,
                        view.block_hash.short_hex().cyan(),
                        view.transaction.document_hash.short_hex(),
                        view.transaction.user_id
                    );
                }
            })
        }
    }
}

fn cmd_serve(ctx: Context, args: ServeArgs) -> anyhow::Result<()> {
    let mut config = ctx.config;
    if let Some(bind) = args.bind {
        config.bind_addr = bind.parse().with_context(|| format!("invalid bind address {bind}"))?;
    }
    let server = DtlServer::open(config)?;
    println!(
        "DTL server on {} (data: {})",
        server.config().bind_addr.to_string().bold(),
        server.config().data_dir.display()
    );
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server.serve())?;
    Ok(())
}
