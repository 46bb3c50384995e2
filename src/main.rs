use channel_router::application::candidate_pool::CandidatePool;
use channel_router::application::engine::{ChannelRouter, RouterPorts};
use channel_router::application::failover::CancelFlag;
use channel_router::application::gateway::Submission;
use channel_router::application::redirect::RedirectEvent;
use channel_router::config::EngineConfig;
use channel_router::domain::amount::Amount;
use channel_router::domain::evidence::LocalFile;
use channel_router::domain::method::PaymentMethod;
use channel_router::domain::ports::EndpointDirectory;
use channel_router::infrastructure::in_memory::{InMemoryPreviewRenderer, InMemorySessionFlags};
use channel_router::infrastructure::simulated::{
    SimulatedBehaviour, SimulatedOrderService, SimulatedUploadService,
};
use channel_router::interfaces::csv::endpoint_reader::CsvEndpointDirectory;
use channel_router::interfaces::csv::report_writer::ReportWriter;
use channel_router::logging;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Matches a funding request against an endpoint directory, simulating the
/// order backend.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Endpoint directory CSV file
    endpoints: PathBuf,

    /// Payment method (alipay, wechat, union_pay, bank_card)
    #[arg(long)]
    method: PaymentMethod,

    /// Requested amount
    #[arg(long)]
    amount: Amount,

    /// Optional TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Endpoint ids whose simulated backend answers without a payment link
    #[arg(long, value_delimiter = ',')]
    fail: Vec<String>,

    /// Endpoint ids whose simulated backend rejects the order outright
    #[arg(long, value_delimiter = ',')]
    reject: Vec<String>,

    /// Only print the candidate ordering, do not submit
    #[arg(long)]
    preview: bool,

    /// Proof-of-payment files for manual methods
    #[arg(long, value_delimiter = ',')]
    evidence: Vec<PathBuf>,

    /// Last four digits of the paying card
    #[arg(long)]
    last_four: Option<String>,

    /// Confirm a redirected payment with this remark
    #[arg(long)]
    confirm: Option<String>,

    /// Seed for candidate ordering
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = EngineConfig::load(cli.config.as_deref()).into_diagnostic()?;
    logging::init_tracing(config.log_json);

    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let directory = CsvEndpointDirectory::new(&cli.endpoints);
    let stdout = io::stdout();

    if cli.preview {
        let endpoints = directory.list(Some(cli.method)).await.into_diagnostic()?;
        let candidates = CandidatePool::new(Box::new(InMemorySessionFlags::new()))
            .select(&endpoints, cli.method, &cli.amount, &mut rng)
            .await
            .into_diagnostic()?;
        ReportWriter::new(stdout.lock())
            .write_candidates(&candidates)
            .into_diagnostic()?;
        return Ok(());
    }

    let service = SimulatedOrderService::new();
    for id in &cli.fail {
        service.set_behaviour(id.as_str(), SimulatedBehaviour::MissingUrl).await;
    }
    for id in &cli.reject {
        service
            .set_behaviour(id.as_str(), SimulatedBehaviour::Reject("order rejected by channel".to_string()))
            .await;
    }

    let mut router = ChannelRouter::new(
        config,
        RouterPorts {
            directory: Box::new(directory),
            orders: Box::new(service),
            uploads: Arc::new(SimulatedUploadService::new("https://uploads.example")),
            previews: Box::new(InMemoryPreviewRenderer::new()),
            flags: Box::new(InMemorySessionFlags::new()),
        },
    )
    .into_diagnostic()?
    .with_rng(rng);

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    router.enter(Some(cli.method)).await.into_diagnostic()?;
    let result = router.start_match(cli.method, cli.amount, &cancel).await;

    ReportWriter::new(stdout.lock())
        .write_attempts(router.last_attempts())
        .into_diagnostic()?;

    match result.into_diagnostic()? {
        Submission::Redirect(redirect) => {
            println!("redirect {}", redirect.url);
            if let Some(remark) = cli.confirm {
                let mut flow = router.open_redirect().into_diagnostic()?;
                let (tx, mut rx) = mpsc::channel(1);
                tx.send(RedirectEvent::ConfirmSuccess { remark })
                    .await
                    .into_diagnostic()?;
                let state = router.run_redirect(&mut flow, &mut rx).await.into_diagnostic()?;
                println!("redirect {:?}", state);
            }
        }
        Submission::EvidenceRequired => {
            println!("evidence required");
            if !cli.evidence.is_empty() {
                let outcome = router
                    .evidence()
                    .add_files(cli.evidence.into_iter().map(LocalFile::new).collect());
                if outcome.limit_exceeded {
                    eprintln!("WARNING: evidence limit exceeded, extra files ignored");
                }
                let accepted = router
                    .submit_evidence(cli.last_four.as_deref())
                    .await
                    .into_diagnostic()?;
                println!("accepted {}", accepted.reference);
            }
        }
    }

    Ok(())
}
