use anyhow::Result;
use argh::FromArgs;
use bbs::{Payment, PaymentEvents, Price, PrintCommand};
use env_logger::{Builder, Env};
use payment_terminal::{PaymentSession, Registry};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand)]
enum SubCommands {
    Pay(PayArgs),
}

#[derive(FromArgs, PartialEq, Debug)]
/// Runs one payment and prints the committed transaction as json.
#[argh(subcommand, name = "pay")]
struct PayArgs {
    /// amount to charge, in currency units, e.g. 10 or 12.34.
    #[argh(option)]
    amount: Price,

    /// refuse the commit handshake; the transaction is authorised on the
    /// terminal and then reversed.
    #[argh(switch)]
    refuse: bool,

    /// cancel the payment this many seconds after it started.
    #[argh(option)]
    cancel_after: Option<u64>,

    /// abandon the wait for a result after this many seconds.
    #[argh(option)]
    timeout: Option<u64>,
}

#[derive(FromArgs, Debug)]
/// Command line tool to drive a BBS MsgRouter payment terminal.
struct Args {
    /// uri of the payment terminal.
    #[argh(option, default = "\"bbs+tcp://localhost:22000\".to_string()")]
    uri: String,

    #[argh(subcommand)]
    command: SubCommands,
}

/// Forwards terminal traffic to the log and answers the commit handshake.
struct ConsoleEvents {
    commit: bool,
}

impl PaymentEvents for ConsoleEvents {
    fn before_commit(&self, payment: &Payment) -> bool {
        log::info!("terminal authorised {}", payment.amount);
        self.commit
    }

    fn on_display(&self, text: &str, _prompt_customer: bool, _expects_input: bool) {
        log::info!("display: {text}");
    }

    fn on_print(&self, commands: &[PrintCommand]) {
        for command in commands {
            match command {
                PrintCommand::Write(line) => log::info!("print: {line}"),
                PrintCommand::CutPartial => log::info!("print: --------"),
                PrintCommand::CutThrough => log::info!("print: ========"),
            }
        }
    }
}

fn init_logger() {
    let env = Env::default().filter_or("BBS_LOGGER_LEVEL", "info");

    Builder::from_env(env)
        .format(|buf, record| writeln!(buf, "{}: {}", record.level(), record.args()))
        .init();
}

async fn pay(registry: &Registry, uri: &str, args: PayArgs) -> Result<()> {
    let terminal = registry.open_terminal(uri).await?;
    let events = Arc::new(ConsoleEvents {
        commit: !args.refuse,
    });
    let session: Arc<dyn PaymentSession> =
        Arc::from(terminal.start_payment(args.amount, events).await?);

    if let Some(seconds) = args.cancel_after {
        let session = session.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(seconds)).await;
            if let Err(err) = session.cancel().await {
                log::warn!("cancel failed: {err}");
            }
        });
    }

    let result = session.result(args.timeout.map(Duration::from_secs)).await;
    terminal.shutdown().await;

    let payment = result?;
    println!("{}", serde_json::to_string_pretty(&payment)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();
    let args: Args = argh::from_env();
    let registry = Registry::default();

    match args.command {
        SubCommands::Pay(pay_args) => pay(&registry, &args.uri, pay_args).await,
    }
}
