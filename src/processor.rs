//! Multisig mint flow

use crate::{
    config::{AirdropPolicy, Config},
    error::{describe_rejection, MintError},
    instruction,
    state::{serialize_pubkey, MintSummary, MultisigConfig, MultisigSummary, TokenAccountSummary},
};
use log::{debug, info, warn};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_program::{instruction::Instruction, program_pack::Pack, pubkey::Pubkey};
use solana_sdk::{
    account::Account,
    signature::{Keypair, Signature},
    signer::Signer,
    transaction::{Transaction, TransactionError},
};
use spl_token::state::{Mint, Multisig};
use std::{future::Future, time::Duration};

/// Number of confirmation polls after requesting an airdrop
pub const AIRDROP_POLL_ATTEMPTS: usize = 30;
/// Delay between confirmation polls
pub const AIRDROP_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of a full run
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    /// fee payer
    #[serde(serialize_with = "serialize_pubkey")]
    pub payer: Pubkey,
    /// multisig created by the run
    pub multisig: MultisigSummary,
    /// mint read back after minting
    pub mint: MintSummary,
    /// token account that received the tokens
    pub associated_account: TokenAccountSummary,
    /// signature of the authorized mint
    pub mint_signature: String,
    /// ledger error returned to the under-signed mint, when attempted
    pub rejected_with: Option<String>,
}

/// Drives the token program through one RPC connection.
pub struct Processor {
    client: RpcClient,
    payer: Keypair,
    config: Config,
}

impl Processor {
    /// Wrap an existing client
    pub fn new(client: RpcClient, payer: Keypair, config: Config) -> Self {
        Processor {
            client,
            payer,
            config,
        }
    }

    /// Open a client to the configured cluster
    pub fn connect(payer: Keypair, config: Config) -> Self {
        let client =
            RpcClient::new_with_commitment(config.cluster.url().to_string(), config.commitment);
        Self::new(client, payer, config)
    }

    /// The fee payer
    pub fn payer(&self) -> &Keypair {
        &self.payer
    }

    /// The run configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Sign with the payer plus `signers`, send and wait for confirmation
    async fn send(
        &self,
        instructions: &[Instruction],
        signers: &[&dyn Signer],
    ) -> Result<Signature, MintError> {
        let blockhash = self.client.get_latest_blockhash().await?;
        let mut transaction = Transaction::new_with_payer(instructions, Some(&self.payer.pubkey()));

        let mut keypairs: Vec<&dyn Signer> = vec![&self.payer];
        keypairs.extend_from_slice(signers);
        transaction.try_sign(keypairs.as_slice(), blockhash)?;

        let signature = self.client.send_and_confirm_transaction(&transaction).await?;
        debug!("Confirmed {}", signature);
        Ok(signature)
    }

    /// Load raw account data
    async fn account_data(&self, address: &Pubkey) -> Result<Vec<u8>, MintError> {
        let account = self
            .client
            .get_account_with_commitment(address, self.config.commitment)
            .await?
            .value
            .ok_or(MintError::AccountNotFound(*address))?;
        Ok(account.data)
    }

    /// Top up `pubkey` when its balance is under the policy minimum. Returns the final balance.
    pub async fn airdrop_if_required(
        &self,
        pubkey: &Pubkey,
        policy: &AirdropPolicy,
    ) -> Result<u64, MintError> {
        let balance = self.client.get_balance(pubkey).await?;
        let lamports = match policy.shortfall(balance) {
            Some(lamports) => lamports,
            None => {
                debug!("{} holds {} lamports, no airdrop needed", pubkey, balance);
                return Ok(balance);
            }
        };

        info!("Requesting airdrop of {} lamports to {}", lamports, pubkey);
        let signature = self.client.request_airdrop(pubkey, lamports).await?;
        let client = &self.client;
        let signature = &signature;
        let commitment = self.config.commitment;
        let confirmed = poll_until(AIRDROP_POLL_ATTEMPTS, AIRDROP_POLL_INTERVAL, || async move {
            let confirmed = client
                .confirm_transaction_with_commitment(signature, commitment)
                .await?
                .value;
            Ok::<bool, MintError>(confirmed)
        })
        .await?;
        if !confirmed {
            return Err(MintError::AirdropNotConfirmed(*pubkey));
        }
        Ok(self.client.get_balance(pubkey).await?)
    }

    /// Create a multisig account for the config and return its address
    pub async fn create_multisig(&self, config: &MultisigConfig) -> Result<Pubkey, MintError> {
        config.validate()?;

        let multisig = Keypair::new();
        let lamports = self
            .client
            .get_minimum_balance_for_rent_exemption(Multisig::LEN)
            .await?;
        let instructions =
            instruction::create_multisig(&self.payer.pubkey(), &multisig.pubkey(), config, lamports)?;
        self.send(&instructions, &[&multisig]).await?;

        info!(
            "Created {}/{} multisig {}",
            config.threshold,
            config.signers.len(),
            multisig.pubkey()
        );
        Ok(multisig.pubkey())
    }

    /// Read back a multisig account
    pub async fn get_multisig(&self, address: &Pubkey) -> Result<MultisigSummary, MintError> {
        let data = self.account_data(address).await?;
        MultisigSummary::unpack(*address, &data)
    }

    /// Create a mint with `authority` as both mint and freeze authority
    pub async fn create_mint(&self, authority: &Pubkey) -> Result<Pubkey, MintError> {
        let mint = Keypair::new();
        let lamports = self
            .client
            .get_minimum_balance_for_rent_exemption(Mint::LEN)
            .await?;
        let instructions = instruction::create_mint(
            &self.payer.pubkey(),
            &mint.pubkey(),
            authority,
            Some(authority),
            self.config.decimals,
            lamports,
        )?;
        self.send(&instructions, &[&mint]).await?;

        info!("Mint public key is: {}", mint.pubkey());
        Ok(mint.pubkey())
    }

    /// Read back a mint account
    pub async fn get_mint(&self, mint: &Pubkey) -> Result<MintSummary, MintError> {
        let data = self.account_data(mint).await?;
        MintSummary::unpack(*mint, &data)
    }

    /// Read back a token account
    pub async fn get_token_account(
        &self,
        address: &Pubkey,
    ) -> Result<TokenAccountSummary, MintError> {
        let data = self.account_data(address).await?;
        TokenAccountSummary::unpack(*address, &data)
    }

    /// Fetch the associated token account of `owner`, creating it when absent
    pub async fn get_or_create_associated_account(
        &self,
        mint: &Pubkey,
        owner: &Pubkey,
    ) -> Result<TokenAccountSummary, MintError> {
        let (address, create) =
            instruction::create_associated_account(&self.payer.pubkey(), owner, mint);

        let existing = self
            .client
            .get_account_with_commitment(&address, self.config.commitment)
            .await?
            .value;
        match create_if_absent(existing.as_ref(), create) {
            Some(create) => {
                self.send(&[create], &[]).await?;
                info!("Created associated token account {}", address);
            }
            None => debug!("Associated token account {} already exists", address),
        }

        self.get_token_account(&address).await
    }

    async fn send_mint_to(
        &self,
        mint: &Pubkey,
        destination: &Pubkey,
        multisig: &Pubkey,
        signers: &[&Keypair],
        amount: u64,
    ) -> Result<Signature, MintError> {
        let signer_keys: Vec<Pubkey> = signers.iter().map(|k| k.pubkey()).collect();
        let mint_to =
            instruction::mint_to_multisig(mint, destination, multisig, &signer_keys, amount)?;
        let signers: Vec<&dyn Signer> = signers.iter().map(|k| *k as &dyn Signer).collect();
        self.send(&[mint_to], &signers).await
    }

    /// Mint `amount` into `destination`, authorized by a quorum of the multisig
    pub async fn mint_to(
        &self,
        mint: &Pubkey,
        destination: &Pubkey,
        multisig: &Pubkey,
        config: &MultisigConfig,
        signers: &[&Keypair],
        amount: u64,
    ) -> Result<Signature, MintError> {
        let signer_keys: Vec<Pubkey> = signers.iter().map(|k| k.pubkey()).collect();
        config.check_quorum(&signer_keys)?;

        let signature = self
            .send_mint_to(mint, destination, multisig, signers, amount)
            .await?;
        info!(
            "Minted {} to {} with {} signatures ({})",
            amount,
            destination,
            signers.len(),
            signature
        );
        Ok(signature)
    }

    /// Send a mint signed by a single member and expect the ledger to refuse it
    pub async fn attempt_under_signed_mint(
        &self,
        mint: &Pubkey,
        destination: &Pubkey,
        multisig: &Pubkey,
        signer: &Keypair,
    ) -> Result<TransactionError, MintError> {
        let result = self
            .send_mint_to(mint, destination, multisig, &[signer], self.config.amount)
            .await;
        let rejection = expect_rejection(result)?;
        warn!("Under-signed mint rejected: {}", rejection);
        Ok(rejection)
    }

    /// Create the multisig and mint, then mint with the first `threshold` signers
    pub async fn run(&self, signers: &[Keypair]) -> Result<RunReport, MintError> {
        let config = MultisigConfig::new(
            signers.iter().map(|k| k.pubkey()).collect(),
            self.config.threshold,
        );
        config.validate()?;

        if let Some(policy) = &self.config.airdrop {
            let balance = self
                .airdrop_if_required(&self.payer.pubkey(), policy)
                .await?;
            info!("Payer balance: {} lamports", balance);
        }

        let multisig = self.create_multisig(&config).await?;
        let multisig_state = self.get_multisig(&multisig).await?;

        let mint = self.create_mint(&multisig).await?;

        let associated_account = self
            .get_or_create_associated_account(&mint, &signers[0].pubkey())
            .await?;
        info!(
            "Associated token account is: {} (owner {})",
            associated_account.address, associated_account.owner
        );

        let quorum = select_quorum(signers, config.threshold);
        let mint_signature = self
            .mint_to(
                &mint,
                &associated_account.address,
                &multisig,
                &config,
                &quorum,
                self.config.amount,
            )
            .await?;

        let rejected_with = if !self.config.under_signed_attempt {
            None
        } else if config.threshold < 2 {
            warn!("Threshold {} is met by one signer, skipping under-signed mint", config.threshold);
            None
        } else {
            self.attempt_under_signed_mint(
                &mint,
                &associated_account.address,
                &multisig,
                &signers[0],
            )
            .await
            .map(|e| Some(describe_rejection(&e)))?
        };

        let mint_state = self.get_mint(&mint).await?;
        let associated_account = self.get_token_account(&associated_account.address).await?;

        Ok(RunReport {
            payer: self.payer.pubkey(),
            multisig: multisig_state,
            mint: mint_state,
            associated_account,
            mint_signature: mint_signature.to_string(),
            rejected_with,
        })
    }
}

/// Keep only a ledger rejection; transport failures and successes are errors
pub fn expect_rejection(
    result: Result<Signature, MintError>,
) -> Result<TransactionError, MintError> {
    match result {
        Ok(signature) => Err(MintError::UnexpectedSuccess(signature.to_string())),
        Err(e) => match e.transaction_error() {
            Some(rejection) => Ok(rejection),
            None => Err(e),
        },
    }
}

/// The create instruction, when the account does not exist yet
pub fn create_if_absent(existing: Option<&Account>, create: Instruction) -> Option<Instruction> {
    match existing {
        Some(_) => None,
        None => Some(create),
    }
}

/// Call `check` up to `attempts` times, sleeping `interval` between misses
pub async fn poll_until<F, Fut>(
    attempts: usize,
    interval: Duration,
    mut check: F,
) -> Result<bool, MintError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, MintError>>,
{
    for attempt in 0..attempts {
        if check().await? {
            return Ok(true);
        }
        if attempt + 1 < attempts {
            tokio::time::sleep(interval).await;
        }
    }
    Ok(false)
}

/// The first `threshold` signers
pub fn select_quorum(signers: &[Keypair], threshold: u8) -> Vec<&Keypair> {
    signers.iter().take(usize::from(threshold)).collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Cluster;
    use solana_client::client_error::ClientError;
    use solana_program::instruction::InstructionError;
    use std::{cell::Cell, str::FromStr};

    fn missing_signature() -> TransactionError {
        TransactionError::InstructionError(0, InstructionError::MissingRequiredSignature)
    }

    #[test]
    fn select_first_signers() {
        let signers: Vec<Keypair> = (0..3).map(|_| Keypair::new()).collect();
        let quorum = select_quorum(&signers, 2);
        assert_eq!(quorum.len(), 2);
        assert_eq!(quorum[0].pubkey(), signers[0].pubkey());
        assert_eq!(quorum[1].pubkey(), signers[1].pubkey());

        let keys: Vec<Pubkey> = quorum.iter().map(|k| k.pubkey()).collect();
        let config = MultisigConfig::new(signers.iter().map(|k| k.pubkey()).collect(), 2);
        assert!(config.check_quorum(&keys).is_ok());
    }

    #[test]
    fn select_quorum_never_exceeds_signers() {
        let signers: Vec<Keypair> = (0..2).map(|_| Keypair::new()).collect();
        assert_eq!(select_quorum(&signers, 5).len(), 2);
        assert!(select_quorum(&signers, 0).is_empty());
    }

    #[test]
    fn connect_uses_cluster_url() {
        let config = Config {
            cluster: Cluster::Localnet,
            ..Config::default()
        };
        let payer = Keypair::new();
        let payer_key = payer.pubkey();
        let processor = Processor::connect(payer, config);
        assert_eq!(processor.client.url(), "http://127.0.0.1:8899");
        assert_eq!(processor.payer().pubkey(), payer_key);
        assert_eq!(processor.config().threshold, 2);
    }

    #[tokio::test]
    async fn run_rejects_invalid_multisig_before_sending() {
        let config = Config {
            cluster: Cluster::Localnet,
            threshold: 4,
            ..Config::default()
        };
        let processor = Processor::connect(Keypair::new(), config);
        let signers: Vec<Keypair> = (0..3).map(|_| Keypair::new()).collect();

        match processor.run(&signers).await {
            Err(MintError::InvalidMultisig(_)) => {}
            other => panic!("unexpected result: {:?}", other.map(|r| r.mint_signature)),
        }
    }

    #[tokio::test]
    async fn mint_to_rejects_missing_quorum_before_sending() {
        let processor = Processor::connect(Keypair::new(), Config::default());
        let signers: Vec<Keypair> = (0..3).map(|_| Keypair::new()).collect();
        let config = MultisigConfig::new(signers.iter().map(|k| k.pubkey()).collect(), 2);

        let result = processor
            .mint_to(
                &Pubkey::new_unique(),
                &Pubkey::new_unique(),
                &Pubkey::new_unique(),
                &config,
                &[&signers[2]],
                1,
            )
            .await;
        match result {
            Err(MintError::InsufficientSigners { have, need }) => assert_eq!((have, need), (1, 2)),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn report_serializes() {
        let report = RunReport {
            payer: Pubkey::from_str("3iFG8xmzDEoQVWR87oT7h8HpBoKU7NxqRpypxAUp1UbT").unwrap(),
            multisig: MultisigSummary {
                address: Pubkey::new_unique(),
                m: 2,
                n: 3,
                signers: vec![Pubkey::new_unique(); 3],
            },
            mint: MintSummary {
                address: Pubkey::new_unique(),
                supply: 1,
                decimals: 9,
                mint_authority: None,
                freeze_authority: None,
            },
            associated_account: TokenAccountSummary {
                address: Pubkey::new_unique(),
                mint: Pubkey::new_unique(),
                owner: Pubkey::new_unique(),
                amount: 1,
            },
            mint_signature: Signature::default().to_string(),
            rejected_with: Some(describe_rejection(&missing_signature())),
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["payer"], "3iFG8xmzDEoQVWR87oT7h8HpBoKU7NxqRpypxAUp1UbT");
        assert_eq!(value["mint"]["supply"], 1);
        assert_eq!(value["multisig"]["signers"].as_array().unwrap().len(), 3);
        assert_eq!(
            value["rejected_with"],
            "InstructionError(0, MissingRequiredSignature)"
        );
    }

    #[test]
    fn ledger_rejection_is_kept() {
        let result = Err(MintError::Client(ClientError::from(missing_signature())));
        assert_eq!(expect_rejection(result).unwrap(), missing_signature());
    }

    #[test]
    fn should_fail_when_under_signed_mint_succeeds() {
        match expect_rejection(Ok(Signature::default())) {
            Err(MintError::UnexpectedSuccess(signature)) => {
                assert_eq!(signature, Signature::default().to_string())
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn local_errors_are_not_rejections() {
        let result = Err(MintError::InsufficientSigners { have: 1, need: 2 });
        match expect_rejection(result) {
            Err(MintError::InsufficientSigners { have, need }) => assert_eq!((have, need), (1, 2)),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn should_fail_when_cluster_is_unreachable() {
        let config = Config {
            cluster: Cluster::Custom("http://127.0.0.1:1".to_string()),
            ..Config::default()
        };
        let processor = Processor::connect(Keypair::new(), config);
        let signer = Keypair::new();

        let result = processor
            .attempt_under_signed_mint(
                &Pubkey::new_unique(),
                &Pubkey::new_unique(),
                &Pubkey::new_unique(),
                &signer,
            )
            .await;
        match result {
            Err(e @ MintError::Client(_)) => assert_eq!(e.transaction_error(), None),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn create_associated_account_only_when_absent() {
        let (_, create) = crate::instruction::create_associated_account(
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
        );

        assert_eq!(create_if_absent(None, create.clone()), Some(create.clone()));
        assert_eq!(create_if_absent(Some(&Account::default()), create), None);
    }

    #[tokio::test]
    async fn poll_gives_up_after_attempts() {
        let calls = Cell::new(0);
        let confirmed = poll_until(3, Duration::ZERO, || {
            calls.set(calls.get() + 1);
            async { Ok::<bool, MintError>(false) }
        })
        .await
        .unwrap();

        assert!(!confirmed);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn poll_stops_at_first_confirmation() {
        let calls = Cell::new(0);
        let confirmed = poll_until(30, Duration::ZERO, || {
            calls.set(calls.get() + 1);
            let done = calls.get() == 2;
            async move { Ok::<bool, MintError>(done) }
        })
        .await
        .unwrap();

        assert!(confirmed);
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn poll_propagates_errors() {
        let calls = Cell::new(0);
        let result = poll_until(3, Duration::ZERO, || {
            calls.set(calls.get() + 1);
            async { Err::<bool, MintError>(MintError::AccountNotFound(Pubkey::default())) }
        })
        .await;

        assert!(matches!(result, Err(MintError::AccountNotFound(_))));
        assert_eq!(calls.get(), 1);
    }
}
