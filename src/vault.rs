use crate::prelude::*;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    NoPasswordSet,
    Locked,
    Unlocked,
}

impl std::fmt::Display for LockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::NoPasswordSet => "no password set",
            Self::Locked => "locked",
            Self::Unlocked => "unlocked",
        })
    }
}

/// What a refresh tick did. `failed` counts records whose secret could
/// not produce a code; those keep an empty `code` rather than a
/// fabricated one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefreshOutcome {
    pub regenerated: bool,
    pub failed: usize,
}

/// The in-memory record list and its lock state machine. Sole writer of
/// the persisted blob: every mutation re-encrypts and writes before it
/// returns, so there is never an unsaved-changes state. Callers pass
/// `now` (unix seconds) wherever codes are computed; the vault itself
/// never reads a clock.
pub struct Vault<S: crate::store::Store> {
    store: S,
    iterations: u32,
    period: u64,
    state: LockState,
    password: Option<crate::locked::Password>,
    records: Vec<crate::record::SecretRecord>,
    last_window: Option<u64>,
}

impl<S: crate::store::Store> Vault<S> {
    /// Lock state comes from whether a password test blob exists, so
    /// opening never needs a password.
    pub async fn open(
        store: S,
        config: &crate::config::Config,
    ) -> Result<Self> {
        let state = if store
            .get(crate::store::PASSWORD_TEST_KEY)
            .await?
            .is_some()
        {
            LockState::Locked
        } else {
            LockState::NoPasswordSet
        };
        Ok(Self {
            store,
            iterations: config.pbkdf2_iterations,
            period: config.period.max(1),
            state,
            password: None,
            records: vec![],
            last_window: None,
        })
    }

    #[must_use]
    pub fn state(&self) -> LockState {
        self.state
    }

    /// A cloned snapshot; the caller never sees the live list.
    #[must_use]
    pub fn records(&self) -> Vec<crate::record::SecretRecord> {
        self.records.clone()
    }

    /// First-time setup. Records left in plaintext by a pre-password
    /// install are carried into the first encrypted blob, which
    /// overwrites them.
    pub async fn set_password(
        &mut self,
        password: crate::locked::Password,
        now: u64,
    ) -> Result<()> {
        match self.state {
            LockState::NoPasswordSet => {}
            LockState::Locked | LockState::Unlocked => {
                return Err(Error::PasswordAlreadySet);
            }
        }
        if password.password().len() < MIN_PASSWORD_LEN {
            return Err(Error::PasswordTooShort {
                min: MIN_PASSWORD_LEN,
            });
        }

        let mut records = vec![];
        if let Some(plaintext) =
            self.store.get(crate::store::RECORDS_KEY).await?
        {
            match plaintext
                .json_with_path::<Vec<crate::record::SecretRecord>>()
            {
                Ok(mut migrated) => {
                    for record in &mut migrated {
                        if let Ok(secret) =
                            crate::totp::normalize_secret(&record.secret)
                        {
                            record.secret = secret;
                        }
                    }
                    records = migrated;
                }
                Err(e) => {
                    log::warn!("ignoring unreadable plaintext records: {e}");
                }
            }
        }

        let test =
            crate::codec::create_password_test(&password, self.iterations)?;
        self.store
            .set(crate::store::PASSWORD_TEST_KEY, &test)
            .await?;

        self.password = Some(password);
        self.records = records;
        self.state = LockState::Unlocked;
        self.recompute(now);
        self.persist().await
    }

    /// Checks the candidate against the password test blob, then loads
    /// the records. A records blob that fails to decrypt under a
    /// validated password leaves the vault unlocked and empty with the
    /// error surfaced; an already unlocked vault is untouched.
    pub async fn unlock(
        &mut self,
        password: crate::locked::Password,
        now: u64,
    ) -> Result<()> {
        match self.state {
            LockState::NoPasswordSet => return Err(Error::PasswordNotSet),
            LockState::Unlocked => return Ok(()),
            LockState::Locked => {}
        }
        let Some(test) =
            self.store.get(crate::store::PASSWORD_TEST_KEY).await?
        else {
            return Err(Error::PasswordNotSet);
        };
        if !crate::codec::validate_password(&test, &password) {
            return Err(Error::IncorrectPassword);
        }

        self.password = Some(password);
        self.state = LockState::Unlocked;
        let loaded = self.load_records().await;
        self.recompute(now);
        loaded
    }

    pub fn lock(&mut self) {
        match self.state {
            LockState::Unlocked => {
                self.password = None;
                self.records.clear();
                self.last_window = None;
                self.state = LockState::Locked;
            }
            LockState::Locked | LockState::NoPasswordSet => {}
        }
    }

    pub async fn add(
        &mut self,
        issuer: &str,
        account: &str,
        secret: &str,
        now: u64,
    ) -> Result<()> {
        self.ensure_unlocked()?;
        let secret = crate::totp::normalize_secret(secret)?;
        let generated =
            crate::totp::generate(&secret, self.period, now)?;
        let mut record =
            crate::record::SecretRecord::new(issuer, account, secret);
        record.code = generated.code;
        record.time_remaining =
            crate::totp::seconds_remaining(self.period, now);
        self.records.push(record);
        self.persist().await
    }

    pub async fn add_from_uri(&mut self, uri: &str, now: u64) -> Result<()> {
        self.ensure_unlocked()?;
        let parsed = crate::uri::parse(uri).ok_or(Error::InvalidUri)?;
        self.add(&parsed.issuer, &parsed.account, &parsed.secret, now)
            .await
    }

    pub async fn remove(&mut self, index: usize) -> Result<()> {
        self.ensure_unlocked()?;
        if index >= self.records.len() {
            return Err(Error::NoSuchRecord { index });
        }
        self.records.remove(index);
        self.persist().await
    }

    /// Appends every record whose secret is usable; the rest are
    /// counted, not imported. One persist at the end.
    pub async fn import_merge(
        &mut self,
        records: Vec<crate::record::SecretRecord>,
        now: u64,
    ) -> Result<crate::record::ImportOutcome> {
        self.ensure_unlocked()?;
        let mut outcome = crate::record::ImportOutcome {
            imported: 0,
            failed: 0,
        };
        for mut record in records {
            let Ok(secret) = crate::totp::normalize_secret(&record.secret)
            else {
                log::warn!(
                    "skipping {}/{}: secret is not base32",
                    record.issuer,
                    record.account
                );
                outcome.failed += 1;
                continue;
            };
            let Ok(generated) =
                crate::totp::generate(&secret, self.period, now)
            else {
                log::warn!(
                    "skipping {}/{}: secret can't produce a code",
                    record.issuer,
                    record.account
                );
                outcome.failed += 1;
                continue;
            };
            record.secret = secret;
            record.code = generated.code;
            record.time_remaining =
                crate::totp::seconds_remaining(self.period, now);
            self.records.push(record);
            outcome.imported += 1;
        }
        self.persist().await?;
        Ok(outcome)
    }

    /// Encrypts the current list and writes it through the store. The
    /// write is awaited, so persistence has happened by the time any
    /// mutation returns.
    pub async fn persist(&self) -> Result<()> {
        self.ensure_unlocked()?;
        let blob = crate::codec::encrypt_value(
            &self.records,
            self.password()?,
            self.iterations,
        )?;
        self.store.set(crate::store::RECORDS_KEY, &blob).await
    }

    /// One scheduler tick. Mid-window only the countdowns move; at a
    /// window boundary (or when the window changed since the last tick,
    /// so timer jitter can't skip one) every code is regenerated and the
    /// vault is persisted.
    pub async fn refresh_at(&mut self, now: u64) -> Result<RefreshOutcome> {
        self.ensure_unlocked()?;
        let window = now / self.period;
        let remaining = crate::totp::seconds_remaining(self.period, now);
        if remaining == self.period || self.last_window != Some(window) {
            let failed = self.recompute(now);
            self.persist().await?;
            return Ok(RefreshOutcome {
                regenerated: true,
                failed,
            });
        }
        for record in &mut self.records {
            record.time_remaining = remaining;
        }
        Ok(RefreshOutcome::default())
    }

    pub fn export_backup(&self, now: u64) -> Result<String> {
        self.ensure_unlocked()?;
        let backup = crate::record::Backup {
            codes: self.records.clone(),
            timestamp: now,
            version: crate::record::BACKUP_VERSION,
        };
        crate::codec::encrypt_value(
            &backup,
            self.password()?,
            self.iterations,
        )
    }

    /// Opens a backup sealed under the session password and merges its
    /// records in. A blob sealed under some other password fails with
    /// `InvalidPasswordOrCorruptData` before anything is touched.
    pub async fn import_backup(
        &mut self,
        blob: &str,
        now: u64,
    ) -> Result<crate::record::ImportOutcome> {
        self.ensure_unlocked()?;
        let envelope = crate::codec::Envelope::new(blob.trim()).map_err(
            |e| match e {
                Error::InvalidEnvelope => Error::InvalidBackupFormat,
                e => e,
            },
        )?;
        let plaintext = envelope.open(self.password()?)?;
        let backup: crate::record::Backup =
            serde_json::from_slice(&plaintext)
                .map_err(|_| Error::InvalidBackupFormat)?;
        self.import_merge(backup.codes, now).await
    }

    /// Deletes both persisted blobs and consumes the vault, returning
    /// the store to its pre-setup state. Works from any lock state,
    /// since a forgotten master password is the main reason to call it.
    pub async fn destroy(self) -> Result<()> {
        self.store.remove(crate::store::RECORDS_KEY).await?;
        self.store.remove(crate::store::PASSWORD_TEST_KEY).await
    }

    fn recompute(&mut self, now: u64) -> usize {
        let remaining = crate::totp::seconds_remaining(self.period, now);
        let mut failed = 0;
        for record in &mut self.records {
            record.time_remaining = remaining;
            match crate::totp::generate(&record.secret, self.period, now) {
                Ok(generated) => record.code = generated.code,
                Err(_) => {
                    log::warn!(
                        "no code for {}/{}: secret is unusable",
                        record.issuer,
                        record.account
                    );
                    record.code = String::new();
                    failed += 1;
                }
            }
        }
        self.last_window = Some(now / self.period);
        failed
    }

    async fn load_records(&mut self) -> Result<()> {
        let Some(blob) =
            self.store.get(crate::store::RECORDS_KEY).await?
        else {
            return Ok(());
        };
        match crate::codec::decrypt_value(&blob, self.password()?) {
            Ok(records) => {
                self.records = records;
                Ok(())
            }
            Err(e) => {
                self.records = vec![];
                Err(e)
            }
        }
    }

    fn password(&self) -> Result<&crate::locked::Password> {
        self.password.as_ref().ok_or(Error::VaultLocked)
    }

    fn ensure_unlocked(&self) -> Result<()> {
        match self.state {
            LockState::Unlocked => Ok(()),
            LockState::Locked => Err(Error::VaultLocked),
            LockState::NoPasswordSet => Err(Error::PasswordNotSet),
        }
    }
}
