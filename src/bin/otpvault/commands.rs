use std::io::Write as _;

use anyhow::Context as _;
use is_terminal::IsTerminal as _;
use otpvault::refresh::Clock as _;
use zeroize::Zeroize as _;

pub async fn config_show() -> anyhow::Result<()> {
    let config = otpvault::config::Config::load()
        .await
        .context("failed to load config")?;
    serde_json::to_writer_pretty(std::io::stdout(), &config)
        .context("failed to write config to stdout")?;
    println!();

    Ok(())
}

pub async fn config_set(key: &str, value: &str) -> anyhow::Result<()> {
    let mut config = otpvault::config::Config::load()
        .await
        .unwrap_or_else(|_| otpvault::config::Config::new());
    match key {
        "pbkdf2_iterations" => {
            let iterations: u32 = value
                .parse()
                .context("failed to parse value for pbkdf2_iterations")?;
            if iterations == 0 {
                return Err(anyhow::anyhow!(
                    "pbkdf2_iterations must be at least 1"
                ));
            }
            config.pbkdf2_iterations = iterations;
        }
        "period" => {
            let period: u64 = value
                .parse()
                .context("failed to parse value for period")?;
            if period == 0 {
                return Err(anyhow::anyhow!("period must be at least 1"));
            }
            config.period = period;
        }
        "store_file" => {
            config.store_file = Some(std::path::PathBuf::from(value));
        }
        _ => return Err(anyhow::anyhow!("invalid config key: {key}")),
    }
    config.save().await.context("failed to save config file")?;

    Ok(())
}

pub async fn config_unset(key: &str) -> anyhow::Result<()> {
    let mut config = otpvault::config::Config::load()
        .await
        .unwrap_or_else(|_| otpvault::config::Config::new());
    let default = otpvault::config::Config::new();
    match key {
        "pbkdf2_iterations" => {
            config.pbkdf2_iterations = default.pbkdf2_iterations;
        }
        "period" => config.period = default.period,
        "store_file" => config.store_file = None,
        _ => return Err(anyhow::anyhow!("invalid config key: {key}")),
    }
    config.save().await.context("failed to save config file")?;

    Ok(())
}

pub async fn init() -> anyhow::Result<()> {
    otpvault::dirs::make_all()?;
    let (config, mut vault) = load_vault().await?;
    if vault.state() != otpvault::vault::LockState::NoPasswordSet {
        return Err(anyhow::anyhow!("vault already has a master password"));
    }

    let password = prompt_password("Master password: ")?;
    let confirm = prompt_password("Confirm master password: ")?;
    if password.password() != confirm.password() {
        return Err(anyhow::anyhow!("passwords do not match"));
    }

    vault
        .set_password(password, now())
        .await
        .context("failed to initialize the vault")?;
    let migrated = vault.records().len();
    if migrated > 0 {
        println!("encrypted {migrated} existing plaintext entries");
    }
    println!("vault created at {}", config.store_file().display());

    Ok(())
}

pub async fn status() -> anyhow::Result<()> {
    let (config, vault) = load_vault().await?;
    println!("state: {}", vault.state());
    println!("store: {}", config.store_file().display());

    Ok(())
}

pub async fn list(visible: bool) -> anyhow::Result<()> {
    let vault = unlocked_vault().await?;
    for (index, record) in vault.records().iter().enumerate() {
        let code = if !visible {
            "******"
        } else if record.code.is_empty() {
            "------"
        } else {
            &record.code
        };
        println!(
            "{index}\t{}\t{}\t{code}\t{}s",
            record.issuer, record.account, record.time_remaining
        );
    }

    Ok(())
}

pub async fn code(needle: &str) -> anyhow::Result<()> {
    let vault = unlocked_vault().await?;
    let records = vault.records();
    let record = find_entry(&records, needle)?;
    if record.code.is_empty() {
        return Err(anyhow::anyhow!(
            "the secret for {}/{} cannot produce a code",
            record.issuer,
            record.account
        ));
    }
    println!("{}", record.code);

    Ok(())
}

pub async fn add(issuer: &str, account: Option<&str>) -> anyhow::Result<()> {
    let mut vault = unlocked_vault().await?;

    let mut secret = prompt_hidden("Secret (base32): ")?;
    let res = vault
        .add(issuer, account.unwrap_or(""), &secret, now())
        .await;
    secret.zeroize();
    res?;

    if let Some(record) = vault.records().pop() {
        println!(
            "added {}/{}: current code is {}",
            record.issuer, record.account, record.code
        );
    }

    Ok(())
}

pub async fn add_uri(uri: Option<&str>) -> anyhow::Result<()> {
    let mut vault = unlocked_vault().await?;

    let mut uri = match uri {
        Some(uri) => uri.to_string(),
        None => prompt_hidden("otpauth uri: ")?,
    };
    let res = vault.add_from_uri(uri.trim(), now()).await;
    uri.zeroize();
    res?;

    if let Some(record) = vault.records().pop() {
        println!("added {}/{}", record.issuer, record.account);
    }

    Ok(())
}

pub async fn remove(index: usize) -> anyhow::Result<()> {
    let mut vault = unlocked_vault().await?;
    let records = vault.records();
    let record = records
        .get(index)
        .ok_or_else(|| anyhow::anyhow!("no entry at index {index}"))?;
    vault.remove(index).await?;
    println!("removed {}/{}", record.issuer, record.account);

    Ok(())
}

pub async fn export(path: &std::path::Path) -> anyhow::Result<()> {
    let vault = unlocked_vault().await?;
    let backup = vault.export_backup(now())?;
    tokio::fs::write(path, backup.as_bytes())
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!(
        "exported {} entries to {}",
        vault.records().len(),
        path.display()
    );

    Ok(())
}

pub async fn import(path: &std::path::Path) -> anyhow::Result<()> {
    let mut vault = unlocked_vault().await?;
    let backup = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let outcome = vault.import_backup(&backup, now()).await?;
    if outcome.failed > 0 {
        println!(
            "imported {} entries, skipped {} with unusable secrets",
            outcome.imported, outcome.failed
        );
    } else {
        println!("imported {} entries", outcome.imported);
    }

    Ok(())
}

pub async fn watch() -> anyhow::Result<()> {
    let vault = unlocked_vault().await?;
    let vault = std::sync::Arc::new(tokio::sync::Mutex::new(vault));
    let refresher = otpvault::refresh::Refresher::spawn(
        vault.clone(),
        otpvault::refresh::SystemClock,
    );

    let res = tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("failed to wait for interrupt")
        }
        () = redraw_loop(&vault) => Ok(()),
    };
    refresher.shutdown().await;

    res
}

pub async fn purge() -> anyhow::Result<()> {
    let (config, vault) = load_vault().await?;
    print!(
        "this permanently deletes the vault at {}; type yes to confirm: ",
        config.store_file().display()
    );
    std::io::stdout()
        .flush()
        .context("failed to write to stdout")?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("failed to read confirmation")?;
    if line.trim() != "yes" {
        return Err(anyhow::anyhow!("not confirmed, nothing deleted"));
    }

    vault.destroy().await?;
    println!("vault deleted");

    Ok(())
}

async fn redraw_loop<S: otpvault::store::Store>(
    vault: &tokio::sync::Mutex<otpvault::vault::Vault<S>>,
) {
    let mut interval =
        tokio::time::interval(std::time::Duration::from_secs(1));
    loop {
        interval.tick().await;
        let records = vault.lock().await.records();
        // ANSI clear so each tick repaints in place
        print!("\x1b[2J\x1b[H");
        for (index, record) in records.iter().enumerate() {
            let code = if record.code.is_empty() {
                "------"
            } else {
                &record.code
            };
            println!(
                "{index}\t{}\t{}\t{code}\t{}s",
                record.issuer, record.account, record.time_remaining
            );
        }
        let _ = std::io::stdout().flush();
    }
}

async fn load_vault() -> anyhow::Result<(
    otpvault::config::Config,
    otpvault::vault::Vault<otpvault::store::FsStore>,
)> {
    let config = otpvault::config::Config::load()
        .await
        .context("failed to load config")?;
    let store = otpvault::store::FsStore::new(config.store_file());
    let vault = otpvault::vault::Vault::open(store, &config)
        .await
        .context("failed to open the vault store")?;
    Ok((config, vault))
}

async fn unlocked_vault(
) -> anyhow::Result<otpvault::vault::Vault<otpvault::store::FsStore>> {
    let (_config, mut vault) = load_vault().await?;
    match vault.state() {
        otpvault::vault::LockState::NoPasswordSet => {
            return Err(anyhow::anyhow!(
                "no vault exists yet; run otpvault init first"
            ));
        }
        otpvault::vault::LockState::Locked => {
            let password = prompt_password("Master password: ")?;
            vault
                .unlock(password, now())
                .await
                .context("failed to unlock the vault")?;
        }
        otpvault::vault::LockState::Unlocked => {}
    }
    Ok(vault)
}

fn find_entry<'a>(
    records: &'a [otpvault::record::SecretRecord],
    needle: &str,
) -> anyhow::Result<&'a otpvault::record::SecretRecord> {
    if let Ok(index) = needle.parse::<usize>() {
        return records
            .get(index)
            .ok_or_else(|| anyhow::anyhow!("no entry at index {index}"));
    }

    let matches: Vec<_> = records
        .iter()
        .filter(|record| {
            record.issuer.eq_ignore_ascii_case(needle)
                || record.account.eq_ignore_ascii_case(needle)
        })
        .collect();
    match matches.len() {
        0 => Err(anyhow::anyhow!("no entry found for {needle}")),
        1 => Ok(matches[0]),
        _ => Err(anyhow::anyhow!(
            "multiple entries found for {needle}, specify an index instead"
        )),
    }
}

fn prompt_password(
    prompt: &str,
) -> anyhow::Result<otpvault::locked::Password> {
    let mut input = prompt_hidden(prompt)?;
    let mut password = otpvault::locked::Vec::new();
    password.extend(input.bytes());
    input.zeroize();
    Ok(otpvault::locked::Password::new(password))
}

// Reads without echo on a terminal, and falls back to a plain stdin
// line so commands can be scripted.
fn prompt_hidden(prompt: &str) -> anyhow::Result<String> {
    if std::io::stdin().is_terminal() {
        rpassword::prompt_password(prompt)
            .context("failed to read input from terminal")
    } else {
        let mut line = String::new();
        std::io::stdin()
            .read_line(&mut line)
            .context("failed to read input from stdin")?;
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }
}

fn now() -> u64 {
    otpvault::refresh::SystemClock.unix_seconds()
}
