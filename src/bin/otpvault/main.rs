use std::io::Write as _;

use anyhow::Context as _;
use clap::{CommandFactory as _, Parser as _};

mod commands;

#[derive(Debug, clap::Parser)]
#[command(version, about = "TOTP authenticator with an encrypted vault")]
enum Opt {
    #[command(about = "Get or set configuration options")]
    Config {
        #[command(subcommand)]
        config: Config,
    },

    #[command(about = "Create a new vault by choosing a master password")]
    Init,

    #[command(about = "Show where the vault lives and whether it is locked")]
    Status,

    #[command(about = "List all entries in the vault", visible_alias = "ls")]
    List {
        #[arg(long, help = "Show the current codes instead of masking them")]
        visible: bool,
    },

    #[command(
        about = "Display the current code for a given entry",
        visible_alias = "totp"
    )]
    Code {
        #[arg(help = "Index, issuer or account of the entry to display")]
        needle: String,
    },

    #[command(about = "Add an entry, prompting for its secret")]
    Add {
        #[arg(help = "Issuer of the new entry")]
        issuer: String,
        #[arg(help = "Account name of the new entry")]
        account: Option<String>,
    },

    #[command(
        name = "add-uri",
        about = "Add an entry from an otpauth:// uri",
        long_about = "Add an entry from an otpauth:// uri\n\n\
            The uri carries the label and the secret, so nothing else \
            needs to be specified. If no uri is given on the command \
            line, one is read from stdin instead."
    )]
    AddUri {
        #[arg(help = "The otpauth:// uri to add")]
        uri: Option<String>,
    },

    #[command(about = "Remove a given entry", visible_alias = "rm")]
    Remove {
        #[arg(help = "Index of the entry to remove, as shown by list")]
        index: usize,
    },

    #[command(about = "Write an encrypted backup of the vault")]
    Export {
        #[arg(help = "File to write the backup to")]
        path: std::path::PathBuf,
    },

    #[command(about = "Merge entries from an encrypted backup into the vault")]
    Import {
        #[arg(help = "File to read the backup from")]
        path: std::path::PathBuf,
    },

    #[command(about = "Show live codes, refreshing until interrupted")]
    Watch,

    #[command(
        about = "Delete the vault, including its master password",
        long_about = "Delete the vault, including its master password\n\n\
            This is the only way to start over after forgetting the \
            master password. The stored secrets are unrecoverable \
            without it, so this asks for confirmation and then deletes \
            everything."
    )]
    Purge,

    #[command(
        name = "gen-completions",
        about = "Generate completion script for the given shell"
    )]
    GenCompletions { shell: clap_complete::Shell },
}

impl Opt {
    fn subcommand_name(&self) -> String {
        match self {
            Self::Config { config } => {
                format!("config {}", config.subcommand_name())
            }
            Self::Init => "init".to_string(),
            Self::Status => "status".to_string(),
            Self::List { .. } => "list".to_string(),
            Self::Code { .. } => "code".to_string(),
            Self::Add { .. } => "add".to_string(),
            Self::AddUri { .. } => "add-uri".to_string(),
            Self::Remove { .. } => "remove".to_string(),
            Self::Export { .. } => "export".to_string(),
            Self::Import { .. } => "import".to_string(),
            Self::Watch => "watch".to_string(),
            Self::Purge => "purge".to_string(),
            Self::GenCompletions { .. } => "gen-completions".to_string(),
        }
    }
}

#[derive(Debug, clap::Parser)]
enum Config {
    #[command(about = "Show the values of all configuration settings")]
    Show,
    #[command(about = "Set a configuration option")]
    Set {
        #[arg(help = "Configuration key to set")]
        key: String,
        #[arg(help = "Value to set the configuration option to")]
        value: String,
    },
    #[command(about = "Reset a configuration option to its default")]
    Unset {
        #[arg(help = "Configuration key to unset")]
        key: String,
    },
}

impl Config {
    fn subcommand_name(&self) -> String {
        match self {
            Self::Show => "show",
            Self::Set { .. } => "set",
            Self::Unset { .. } => "unset",
        }
        .to_string()
    }
}

fn main() {
    let opt = Opt::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format(|buf, record| {
        if let Some((terminal_size::Width(w), _)) =
            terminal_size::terminal_size()
        {
            let out = format!("{}: {}", record.level(), record.args());
            writeln!(buf, "{}", textwrap::fill(&out, usize::from(w) - 1))
        } else {
            writeln!(buf, "{}: {}", record.level(), record.args())
        }
    })
    .init();

    let subcommand_name = opt.subcommand_name();
    let res =
        run(opt).with_context(|| format!("otpvault {subcommand_name}"));

    if let Err(e) = res {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

fn run(opt: Opt) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()
        .context("failed to create async runtime")?;
    runtime.block_on(async {
        match opt {
            Opt::Config { config } => match config {
                Config::Show => commands::config_show().await,
                Config::Set { key, value } => {
                    commands::config_set(&key, &value).await
                }
                Config::Unset { key } => commands::config_unset(&key).await,
            },
            Opt::Init => commands::init().await,
            Opt::Status => commands::status().await,
            Opt::List { visible } => commands::list(visible).await,
            Opt::Code { needle } => commands::code(&needle).await,
            Opt::Add { issuer, account } => {
                commands::add(&issuer, account.as_deref()).await
            }
            Opt::AddUri { uri } => commands::add_uri(uri.as_deref()).await,
            Opt::Remove { index } => commands::remove(index).await,
            Opt::Export { path } => commands::export(&path).await,
            Opt::Import { path } => commands::import(&path).await,
            Opt::Watch => commands::watch().await,
            Opt::Purge => commands::purge().await,
            Opt::GenCompletions { shell } => {
                clap_complete::generate(
                    shell,
                    &mut Opt::command(),
                    "otpvault",
                    &mut std::io::stdout(),
                );
                Ok(())
            }
        }
    })
}
