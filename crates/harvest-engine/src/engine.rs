//! The distribution state machine.
//!
//! [`DistributionEngine`] owns the pool registry, the epoch history, the
//! claim ledger and the treasury. Every state-changing method takes the
//! caller's account, checks it against the [`Authority`], and either
//! succeeds completely or returns an error without touching engine state.
//! The one exception is a collection page that fails after some pools have
//! already delivered: see [`DistributionEngine::collect_interest`].

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use tracing::{debug, info, warn};

use harvest_crypto::merkle::verify_claim;
use harvest_oracle::swap::Converter;
use harvest_types::events::{DistributionMode, EngineEvent};
use harvest_types::{Address, Amount, EpochId, Hash, PoolId, ShareUnits};

use crate::claims::{pro_rata, Claim, ClaimLedger, Settlement};
use crate::config::{Authority, EngineConfig, Role};
use crate::epoch::{Epoch, EpochState, PageDecision};
use crate::registry::{PoolEntry, PoolRegistry};
use crate::snapshot::EngineSnapshot;
use crate::source::{InterestSource, SourceError};
use crate::treasury::Treasury;
use crate::{EngineError, Result};

/// Outcome of one collection call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageReport {
    pub epoch_id: EpochId,
    /// Pools processed by this call; empty for a replayed page.
    pub range: Range<usize>,
    /// Reward added to the epoch by this call.
    pub collected: Amount,
    /// Collection cursor after the call.
    pub cursor: usize,
    /// Whether every registered pool has been collected.
    pub complete: bool,
}

/// Epoch distribution engine.
#[derive(Debug)]
pub struct DistributionEngine {
    authority: Authority,
    engine_account: Address,
    reward_token: Address,
    max_page_size: usize,
    registry: PoolRegistry,
    epochs: Vec<Epoch>,
    ledger: ClaimLedger,
    treasury: Treasury,
    events: Vec<EngineEvent>,
}

fn helper_or_zero(helper: Option<Address>) -> Address {
    helper.unwrap_or(Address::ZERO)
}

fn epoch_index(epoch_id: EpochId) -> Option<usize> {
    usize::try_from(epoch_id).ok()
}

impl DistributionEngine {
    /// Build an engine from a validated configuration.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        info!(
            admin = %config.admin,
            oracle = %config.oracle,
            reward_token = %config.reward_token,
            max_page_size = config.max_page_size,
            "Distribution engine created"
        );
        Ok(Self {
            authority: config.authority(),
            engine_account: config.engine_account,
            reward_token: config.reward_token,
            max_page_size: config.max_page_size,
            registry: PoolRegistry::new(),
            epochs: Vec::new(),
            ledger: ClaimLedger::new(),
            treasury: Treasury::new(),
            events: Vec::new(),
        })
    }

    // ------------------------------------------------------------------
    // Pool registry
    // ------------------------------------------------------------------

    /// Register a pool with an optional swap helper. Admin only.
    pub fn add_pool(
        &mut self,
        caller: Address,
        source: Box<dyn InterestSource>,
        helper: Option<Box<dyn Converter>>,
    ) -> Result<PoolId> {
        self.authority.require(Role::Admin, caller)?;
        let pool = source.address();
        let pool_id = self.registry.add(source, helper)?;
        let swap_helper =
            helper_or_zero(self.registry.get(pool_id).and_then(PoolEntry::swap_helper));

        info!(pool_id, %pool, %swap_helper, "Pool added");
        self.events.push(EngineEvent::PoolAdded {
            pool_id,
            pool,
            swap_helper,
        });
        Ok(pool_id)
    }

    /// Replace or clear a pool's swap helper. Admin only.
    pub fn set_swap_helper(
        &mut self,
        caller: Address,
        pool_id: PoolId,
        helper: Option<Box<dyn Converter>>,
    ) -> Result<()> {
        self.authority.require(Role::Admin, caller)?;
        let (old, new) = self.registry.set_helper(pool_id, helper)?;
        let old_helper = helper_or_zero(old);
        let new_helper = helper_or_zero(new);

        info!(pool_id, %old_helper, %new_helper, "Swap helper changed");
        self.events.push(EngineEvent::SwapHelperChanged {
            pool_id,
            old_helper,
            new_helper,
        });
        Ok(())
    }

    pub fn pool(&self, pool_id: PoolId) -> Option<&PoolEntry> {
        self.registry.get(pool_id)
    }

    pub fn pools(&self) -> &[PoolEntry] {
        self.registry.pools()
    }

    pub fn pool_count(&self) -> usize {
        self.registry.len()
    }

    // ------------------------------------------------------------------
    // Epoch lifecycle
    // ------------------------------------------------------------------

    /// Open a proof-mode epoch committing to `root`. Oracle only.
    pub fn define_epoch(
        &mut self,
        caller: Address,
        root: Hash,
        total_shares: ShareUnits,
    ) -> Result<EpochId> {
        self.authority.require(Role::Oracle, caller)?;
        if total_shares == 0 {
            return Err(EngineError::InvalidConfiguration(
                "total_shares must be positive".to_string(),
            ));
        }
        self.define(caller, DistributionMode::Proof { root, total_shares })
    }

    /// Open a push-mode epoch. Oracle only.
    pub fn define_push_epoch(&mut self, caller: Address) -> Result<EpochId> {
        self.define(caller, DistributionMode::Push)
    }

    fn define(&mut self, caller: Address, mode: DistributionMode) -> Result<EpochId> {
        self.authority.require(Role::Oracle, caller)?;
        if let Some(open) = self.open_epoch() {
            return Err(EngineError::EpochAlreadyOpen { epoch_id: open.id });
        }

        let epoch_id = self.epochs.len() as EpochId;
        self.epochs.push(Epoch::new(epoch_id, mode));

        info!(epoch_id, mode = mode.label(), "Epoch defined");
        self.events.push(EngineEvent::EpochDefined { epoch_id, mode });
        Ok(epoch_id)
    }

    /// Collect interest from pools `[start, start + count)` into `epoch_id`.
    /// Oracle only.
    ///
    /// The page end is clamped to the registry length. A page lying entirely
    /// below the cursor is accepted as a replay and does nothing. A page must
    /// otherwise start exactly at the cursor.
    ///
    /// Every pool in the page is checked read-only first, so most failures
    /// reject the page before any pool is touched. If a pool still fails
    /// afterwards, the cursor and `interest_earned` stay put. Reward already
    /// delivered by earlier pools of the page is held as the epoch's carried
    /// amount, and unconverted native interest stays pending on its pool.
    /// Both are picked up by the retry.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Unauthorized`] if `caller` is not the oracle
    /// - [`EngineError::UnknownEpoch`] / [`EngineError::EpochNotOpen`]
    /// - [`EngineError::PageTooLarge`] if `count` exceeds the page limit
    /// - [`EngineError::PaginationMismatch`] on gaps or overlaps
    /// - [`EngineError::RewardAssetMismatch`] if a pool does not yield the
    ///   reward token
    /// - [`EngineError::Source`] / [`EngineError::Swap`] on adapter failure
    pub fn collect_interest(
        &mut self,
        caller: Address,
        epoch_id: EpochId,
        start: usize,
        count: usize,
    ) -> Result<PageReport> {
        self.authority.require(Role::Oracle, caller)?;
        let epoch = self.open_epoch_by_id(epoch_id)?;
        if count > self.max_page_size {
            warn!(epoch_id, count, max = self.max_page_size, "Page too large");
            return Err(EngineError::PageTooLarge {
                count,
                max: self.max_page_size,
            });
        }

        let pool_count = self.registry.len();
        let cursor = epoch.cursor;
        match epoch.resolve_page(start, count, pool_count) {
            Ok(PageDecision::AlreadyCollected) => {
                debug!(epoch_id, start, count, cursor, "Page already collected");
                Ok(PageReport {
                    epoch_id,
                    range: start..start,
                    collected: 0,
                    cursor,
                    complete: cursor == pool_count,
                })
            }
            Ok(PageDecision::Process(range)) => self.process_page(epoch_id, range),
            Err(e) => {
                warn!(epoch_id, start, count, cursor, "Page rejected");
                Err(e)
            }
        }
    }

    /// Collect the next page from the cursor using the configured page size.
    pub fn collect_next_page(&mut self, caller: Address, epoch_id: EpochId) -> Result<PageReport> {
        self.authority.require(Role::Oracle, caller)?;
        let cursor = self.open_epoch_by_id(epoch_id)?.cursor;
        self.collect_interest(caller, epoch_id, cursor, self.max_page_size)
    }

    fn process_page(&mut self, epoch_id: EpochId, range: Range<usize>) -> Result<PageReport> {
        let readings = self.preflight(range.clone())?;

        let mut credited: Amount = 0;
        for (pool_id, reading) in range.clone().zip(readings) {
            let result = self
                .harvest_pool(epoch_id, pool_id, reading)
                .and_then(|amount| credited.checked_add(amount).ok_or(EngineError::Overflow));
            match result {
                Ok(total) => credited = total,
                Err(e) => {
                    let epoch = self.epoch_mut(epoch_id)?;
                    epoch.carried = epoch
                        .carried
                        .checked_add(credited)
                        .ok_or(EngineError::Overflow)?;
                    warn!(
                        epoch_id,
                        pool_id,
                        carried = epoch.carried,
                        error = %e,
                        "Collection page failed"
                    );
                    return Err(e);
                }
            }
        }

        let pool_count = self.registry.len();
        let epoch = self.epoch_mut(epoch_id)?;
        let collected = credited
            .checked_add(epoch.carried)
            .ok_or(EngineError::Overflow)?;
        epoch.interest_earned = epoch
            .interest_earned
            .checked_add(collected)
            .ok_or(EngineError::Overflow)?;
        epoch.carried = 0;
        epoch.cursor = range.end;
        epoch.state = EpochState::Collecting;

        info!(
            epoch_id,
            start = range.start,
            end = range.end,
            collected,
            interest_earned = epoch.interest_earned,
            "Collection page processed"
        );
        Ok(PageReport {
            epoch_id,
            range,
            collected,
            cursor: epoch.cursor,
            complete: epoch.cursor == pool_count,
        })
    }

    /// Read-only pass over a page. Returns each pool's interest reading.
    fn preflight(&self, range: Range<usize>) -> Result<Vec<Amount>> {
        let mut readings = Vec::with_capacity(range.len());
        for pool_id in range {
            let entry = self
                .registry
                .get(pool_id)
                .ok_or(EngineError::UnknownPool { pool_id })?;

            let output = entry.output_token();
            if output != self.reward_token {
                warn!(pool_id, %output, reward_token = %self.reward_token, "Pool yields wrong asset");
                return Err(EngineError::RewardAssetMismatch {
                    pool_id,
                    expected: self.reward_token,
                    actual: output,
                });
            }

            let reading = entry
                .source()
                .interest_available()
                .map_err(|source| EngineError::Source { pool_id, source })?;

            if let Some(helper) = entry.helper() {
                let native = reading
                    .checked_add(entry.pending())
                    .ok_or(EngineError::Overflow)?;
                helper.preview(native).map_err(|source| {
                    warn!(pool_id, native, error = %source, "Swap preview rejected");
                    EngineError::Swap { pool_id, source }
                })?;
            }
            readings.push(reading);
        }
        Ok(readings)
    }

    /// Collect and convert one pool, crediting the treasury.
    fn harvest_pool(
        &mut self,
        epoch_id: EpochId,
        pool_id: PoolId,
        reading: Amount,
    ) -> Result<Amount> {
        let engine_account = self.engine_account;
        let entry = self
            .registry
            .get_mut(pool_id)
            .ok_or(EngineError::UnknownPool { pool_id })?;

        let collected = entry
            .source_mut()
            .collect_interest()
            .map_err(|source| EngineError::Source { pool_id, source })?;
        let native = entry
            .pending()
            .checked_add(collected)
            .ok_or(EngineError::Overflow)?;
        if collected > reading {
            entry.set_pending(native);
            return Err(EngineError::Source {
                pool_id,
                source: SourceError::Overcollected {
                    available: reading,
                    collected,
                },
            });
        }

        let converted = match entry.helper_mut() {
            Some(helper) if native > 0 => Some(helper.convert(native, engine_account)),
            _ => None,
        };
        let credited = match converted {
            Some(Ok(out)) => out,
            Some(Err(source)) => {
                entry.set_pending(native);
                return Err(EngineError::Swap { pool_id, source });
            }
            None if entry.helper().is_some() => 0,
            None => native,
        };
        if let Err(e) = self.treasury.credit(self.reward_token, credited) {
            entry.set_pending(native);
            return Err(e);
        }
        entry.set_pending(0);
        entry.record_collected(native)?;

        debug!(epoch_id, pool_id, collected = native, credited, "Pool collected");
        self.events.push(EngineEvent::InterestCollected {
            epoch_id,
            pool_id,
            collected: native,
            credited,
        });
        Ok(credited)
    }

    /// Lock the open epoch's totals and open it for claims. Oracle only.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NoOpenEpoch`] if every epoch is final
    /// - [`EngineError::CollectionIncomplete`] unless every pool was collected
    pub fn finalize_epoch(&mut self, caller: Address) -> Result<EpochId> {
        self.authority.require(Role::Oracle, caller)?;
        let pool_count = self.registry.len();
        let reward_token = self.reward_token;
        let epoch = match self.epochs.last_mut() {
            Some(epoch) if epoch.is_open() => epoch,
            _ => return Err(EngineError::NoOpenEpoch),
        };
        if epoch.cursor != pool_count {
            return Err(EngineError::CollectionIncomplete {
                epoch_id: epoch.id,
                cursor: epoch.cursor,
                pool_count,
            });
        }

        epoch.interest_earned = epoch
            .interest_earned
            .checked_add(epoch.carried)
            .ok_or(EngineError::Overflow)?;
        epoch.carried = 0;
        epoch.reward_token = Some(reward_token);
        epoch.state = EpochState::Finalized;

        let epoch_id = epoch.id;
        let interest_earned = epoch.interest_earned;
        info!(epoch_id, interest_earned, %reward_token, "Epoch finalized");
        self.events.push(EngineEvent::EpochFinalized {
            epoch_id,
            interest_earned,
            reward_token,
        });
        Ok(epoch_id)
    }

    // ------------------------------------------------------------------
    // Settlement
    // ------------------------------------------------------------------

    /// Settle a batch of proof-mode claims for `caller`.
    ///
    /// The batch is all-or-nothing: every claim is validated and the
    /// treasury checked per token before anything is paid or flagged.
    pub fn claim_reward(&mut self, caller: Address, claims: &[Claim]) -> Result<Vec<Settlement>> {
        let mut seen = BTreeSet::new();
        let mut totals: BTreeMap<Address, Amount> = BTreeMap::new();
        let mut settlements = Vec::with_capacity(claims.len());

        for claim in claims {
            if !seen.insert(claim.epoch_id) {
                return Err(EngineError::AlreadyClaimed {
                    epoch_id: claim.epoch_id,
                    beneficiary: caller,
                });
            }
            let settlement = self.settle(caller, claim)?;
            let total = totals.entry(settlement.token).or_insert(0);
            *total = total
                .checked_add(settlement.amount)
                .ok_or(EngineError::Overflow)?;
            settlements.push(settlement);
        }
        for (token, total) in &totals {
            self.treasury.ensure_available(*token, *total)?;
        }

        for settlement in &settlements {
            let epoch = self.epoch_mut(settlement.epoch_id)?;
            epoch.paid_out = epoch
                .paid_out
                .checked_add(settlement.amount)
                .ok_or(EngineError::Overflow)?;
            self.treasury.pay(settlement.token, settlement.amount)?;
            self.ledger.mark(settlement.epoch_id, settlement.beneficiary);
            self.events.push(EngineEvent::RewardClaimed {
                epoch_id: settlement.epoch_id,
                beneficiary: settlement.beneficiary,
                token: settlement.token,
                amount: settlement.amount,
            });
        }

        if !settlements.is_empty() {
            info!(beneficiary = %caller, claims = settlements.len(), "Rewards claimed");
        }
        Ok(settlements)
    }

    /// Whether `claim`'s proof matches the epoch commitment. Read-only and
    /// independent of finalization or claim status.
    pub fn claim_proof_valid(&self, beneficiary: &Address, claim: &Claim) -> bool {
        match self.epoch(claim.epoch_id).map(|e| e.mode) {
            Some(DistributionMode::Proof { root, .. }) => {
                verify_claim(&root, beneficiary, claim.share_units, &claim.proof)
            }
            _ => false,
        }
    }

    /// Amount `claim` would pay `beneficiary` right now.
    pub fn claimable(&self, beneficiary: &Address, claim: &Claim) -> Result<Amount> {
        Ok(self.settle(*beneficiary, claim)?.amount)
    }

    pub fn is_claimed(&self, epoch_id: EpochId, beneficiary: &Address) -> bool {
        self.ledger.is_claimed(epoch_id, beneficiary)
    }

    fn settle(&self, beneficiary: Address, claim: &Claim) -> Result<Settlement> {
        let epoch_id = claim.epoch_id;
        let epoch = self
            .epoch(epoch_id)
            .ok_or(EngineError::UnknownEpoch { epoch_id })?;
        let token = match (epoch.state, epoch.reward_token) {
            (EpochState::Finalized, Some(token)) => token,
            _ => return Err(EngineError::EpochNotFinalized { epoch_id }),
        };
        let DistributionMode::Proof { root, total_shares } = epoch.mode else {
            return Err(EngineError::WrongMode {
                epoch_id,
                expected: "proof",
            });
        };
        if self.ledger.is_claimed(epoch_id, &beneficiary) {
            return Err(EngineError::AlreadyClaimed {
                epoch_id,
                beneficiary,
            });
        }
        if !verify_claim(&root, &beneficiary, claim.share_units, &claim.proof) {
            debug!(epoch_id, %beneficiary, "Claim proof rejected");
            return Err(EngineError::InvalidProof {
                epoch_id,
                beneficiary,
            });
        }

        if claim.share_units > total_shares {
            return Err(EngineError::SharesExceedTotal {
                epoch_id,
                share_units: claim.share_units,
                total_shares,
            });
        }

        let amount = pro_rata(epoch.interest_earned, claim.share_units, total_shares)?;
        let remaining = epoch.interest_earned.saturating_sub(epoch.paid_out);
        if amount > remaining {
            warn!(epoch_id, %beneficiary, amount, remaining, "Claim exceeds epoch reward");
            return Err(EngineError::EpochExhausted {
                epoch_id,
                required: amount,
                remaining,
            });
        }
        Ok(Settlement {
            epoch_id,
            beneficiary,
            token,
            amount,
        })
    }

    /// Pay a pre-computed list directly. Oracle only.
    ///
    /// Nothing is paid unless the engine holds the list total of `token`.
    /// Returns the total paid.
    pub fn distribute_interest(
        &mut self,
        caller: Address,
        token: Address,
        payouts: &[(Address, Amount)],
    ) -> Result<Amount> {
        self.authority.require(Role::Oracle, caller)?;
        let total = payouts
            .iter()
            .try_fold(0u128, |acc, (_, amount)| acc.checked_add(*amount))
            .ok_or(EngineError::Overflow)?;
        self.treasury.ensure_available(token, total)?;

        for &(beneficiary, amount) in payouts {
            self.treasury.pay(token, amount)?;
            self.events.push(EngineEvent::InterestDistributed {
                token,
                beneficiary,
                amount,
            });
        }
        info!(%token, recipients = payouts.len(), total, "Interest distributed");
        Ok(total)
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    /// Change the reward token. Admin only; refused once the open epoch
    /// holds any collected reward.
    pub fn set_reward_token(&mut self, caller: Address, token: Address) -> Result<()> {
        self.authority.require(Role::Admin, caller)?;
        if token.is_zero() {
            return Err(EngineError::InvalidConfiguration(
                "reward token is zero".to_string(),
            ));
        }
        if let Some(epoch) = self.open_epoch() {
            // Reward from a failed first page is already held in the old token
            if epoch.state == EpochState::Collecting || epoch.carried > 0 {
                return Err(EngineError::RewardTokenLocked { epoch_id: epoch.id });
            }
        }

        let old_token = self.reward_token;
        self.reward_token = token;
        info!(%old_token, new_token = %token, "Reward token changed");
        self.events.push(EngineEvent::RewardTokenChanged {
            old_token,
            new_token: token,
        });
        Ok(())
    }

    /// Hand the oracle role to `account`. Admin only.
    pub fn set_oracle_account(&mut self, caller: Address, account: Address) -> Result<()> {
        self.authority.require(Role::Admin, caller)?;
        if account.is_zero() {
            return Err(EngineError::InvalidConfiguration(
                "oracle account is zero".to_string(),
            ));
        }
        let old_account = self.authority.oracle;
        self.authority.oracle = account;
        info!(%old_account, new_account = %account, "Oracle account changed");
        self.events.push(EngineEvent::OracleAccountChanged {
            old_account,
            new_account: account,
        });
        Ok(())
    }

    /// Hand the admin role to `account`. Admin only.
    pub fn set_admin_account(&mut self, caller: Address, account: Address) -> Result<()> {
        self.authority.require(Role::Admin, caller)?;
        if account.is_zero() {
            return Err(EngineError::InvalidConfiguration(
                "admin account is zero".to_string(),
            ));
        }
        let old_account = self.authority.admin;
        self.authority.admin = account;
        info!(%old_account, new_account = %account, "Admin account changed");
        self.events.push(EngineEvent::AdminAccountChanged {
            old_account,
            new_account: account,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn epoch(&self, epoch_id: EpochId) -> Option<&Epoch> {
        epoch_index(epoch_id).and_then(|i| self.epochs.get(i))
    }

    pub fn epochs(&self) -> &[Epoch] {
        &self.epochs
    }

    pub fn epochs_count(&self) -> usize {
        self.epochs.len()
    }

    /// The latest epoch, if it is not finalized.
    pub fn open_epoch(&self) -> Option<&Epoch> {
        self.epochs.last().filter(|e| e.is_open())
    }

    pub fn reward_token(&self) -> Address {
        self.reward_token
    }

    pub fn authority(&self) -> Authority {
        self.authority
    }

    pub fn engine_account(&self) -> Address {
        self.engine_account
    }

    pub fn max_page_size(&self) -> usize {
        self.max_page_size
    }

    pub fn treasury(&self) -> &Treasury {
        &self.treasury
    }

    pub fn ledger(&self) -> &ClaimLedger {
        &self.ledger
    }

    /// Events emitted so far, oldest first.
    pub fn events(&self) -> &[EngineEvent] {
        &self.events
    }

    /// Take the event log, leaving it empty.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot::capture(self)
    }

    fn open_epoch_by_id(&self, epoch_id: EpochId) -> Result<&Epoch> {
        let epoch = self
            .epoch(epoch_id)
            .ok_or(EngineError::UnknownEpoch { epoch_id })?;
        if !epoch.is_open() {
            return Err(EngineError::EpochNotOpen { epoch_id });
        }
        Ok(epoch)
    }

    fn epoch_mut(&mut self, epoch_id: EpochId) -> Result<&mut Epoch> {
        epoch_index(epoch_id)
            .and_then(|i| self.epochs.get_mut(i))
            .ok_or(EngineError::UnknownEpoch { epoch_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use crate::ErrorKind;
    use harvest_crypto::merkle::MerkleTree;
    use harvest_oracle::stub::FixedRateConverter;

    const ADMIN: u64 = 1;
    const ORACLE: u64 = 2;
    const REWARD: u64 = 100;
    const NATIVE: u64 = 101;

    fn addr(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    fn engine() -> DistributionEngine {
        let config = EngineConfig {
            engine_account: addr(3),
            max_page_size: 2,
            ..EngineConfig::new(addr(ADMIN), addr(ORACLE), addr(REWARD))
        };
        DistributionEngine::new(config).expect("engine")
    }

    /// Adds a reward-token pool with `interest` ready to collect.
    fn add_pool(engine: &mut DistributionEngine, n: u64, interest: Amount) -> MemorySource {
        let source = MemorySource::new(addr(n), addr(REWARD));
        source.deposit(1_000);
        source.accrue(interest);
        engine
            .add_pool(addr(ADMIN), Box::new(source.clone()), None)
            .expect("add pool");
        source
    }

    fn oracle() -> Address {
        addr(ORACLE)
    }

    #[test]
    fn test_admin_only_registry() {
        let mut engine = engine();
        let source = MemorySource::new(addr(10), addr(REWARD));
        let err = engine
            .add_pool(oracle(), Box::new(source), None)
            .expect_err("oracle cannot add pools");
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert_eq!(engine.pool_count(), 0);
        assert!(engine.events().is_empty());
    }

    #[test]
    fn test_define_requires_oracle_and_closed_epoch() {
        let mut engine = engine();
        assert!(matches!(
            engine.define_push_epoch(addr(ADMIN)),
            Err(EngineError::Unauthorized { role: Role::Oracle, .. })
        ));
        assert_eq!(engine.define_push_epoch(oracle()).expect("define"), 0);
        assert!(matches!(
            engine.define_push_epoch(oracle()),
            Err(EngineError::EpochAlreadyOpen { epoch_id: 0 })
        ));
        assert!(matches!(
            engine.define_epoch(oracle(), [1u8; 32], 0),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_collect_and_finalize() {
        let mut engine = engine();
        add_pool(&mut engine, 10, 40);
        add_pool(&mut engine, 11, 60);
        add_pool(&mut engine, 12, 5);

        let epoch_id = engine.define_push_epoch(oracle()).expect("define");
        let first = engine.collect_interest(oracle(), epoch_id, 0, 2).expect("page 1");
        assert_eq!(first.range, 0..2);
        assert_eq!(first.collected, 100);
        assert!(!first.complete);
        assert!(matches!(
            engine.finalize_epoch(oracle()),
            Err(EngineError::CollectionIncomplete { cursor: 2, pool_count: 3, .. })
        ));

        let second = engine.collect_next_page(oracle(), epoch_id).expect("page 2");
        assert_eq!(second.range, 2..3);
        assert!(second.complete);

        engine.finalize_epoch(oracle()).expect("finalize");
        let epoch = engine.epoch(epoch_id).expect("epoch");
        assert_eq!(epoch.interest_earned, 105);
        assert_eq!(epoch.reward_token, Some(addr(REWARD)));
        assert_eq!(engine.treasury().held(&addr(REWARD)), 105);
        assert!(engine.open_epoch().is_none());
    }

    #[test]
    fn test_page_limits() {
        let mut engine = engine();
        add_pool(&mut engine, 10, 1);
        add_pool(&mut engine, 11, 1);
        add_pool(&mut engine, 12, 1);
        let epoch_id = engine.define_push_epoch(oracle()).expect("define");

        assert!(matches!(
            engine.collect_interest(oracle(), epoch_id, 0, 3),
            Err(EngineError::PageTooLarge { count: 3, max: 2 })
        ));
        assert!(matches!(
            engine.collect_interest(oracle(), epoch_id, 1, 2),
            Err(EngineError::PaginationMismatch { start: 1, cursor: 0, .. })
        ));
        engine.collect_interest(oracle(), epoch_id, 0, 2).expect("page");
        let replay = engine.collect_interest(oracle(), epoch_id, 0, 2).expect("replay");
        assert_eq!(replay.collected, 0);
        assert_eq!(replay.cursor, 2);
        assert_eq!(engine.epoch(epoch_id).expect("epoch").interest_earned, 2);
    }

    #[test]
    fn test_collect_wrong_epoch() {
        let mut engine = engine();
        add_pool(&mut engine, 10, 1);
        assert!(matches!(
            engine.collect_interest(oracle(), 0, 0, 1),
            Err(EngineError::UnknownEpoch { epoch_id: 0 })
        ));
        let epoch_id = engine.define_push_epoch(oracle()).expect("define");
        engine.collect_interest(oracle(), epoch_id, 0, 1).expect("page");
        engine.finalize_epoch(oracle()).expect("finalize");
        assert!(matches!(
            engine.collect_interest(oracle(), epoch_id, 0, 1),
            Err(EngineError::EpochNotOpen { epoch_id: 0 })
        ));
    }

    #[test]
    fn test_helper_converts_to_reward() {
        let mut engine = engine();
        let source = MemorySource::new(addr(10), addr(NATIVE));
        source.deposit(10_000);
        source.accrue_rate(10, 100);
        let helper = FixedRateConverter::new(addr(50), addr(NATIVE), addr(REWARD), 3);
        engine
            .add_pool(addr(ADMIN), Box::new(source), Some(Box::new(helper.clone())))
            .expect("add pool");

        let epoch_id = engine.define_push_epoch(oracle()).expect("define");
        let report = engine.collect_interest(oracle(), epoch_id, 0, 2).expect("page");
        assert_eq!(report.collected, 3_000);
        assert_eq!(helper.total_converted(), 1_000);
        assert_eq!(engine.pool(0).expect("pool").collected(), 1_000);
        assert!(engine.events().iter().any(|e| matches!(
            e,
            EngineEvent::InterestCollected { collected: 1_000, credited: 3_000, .. }
        )));
    }

    #[test]
    fn test_wrong_asset_rejected_before_collection() {
        let mut engine = engine();
        let good = add_pool(&mut engine, 10, 7);
        let bad = MemorySource::new(addr(11), addr(NATIVE));
        bad.deposit(10);
        bad.accrue(1);
        engine
            .add_pool(addr(ADMIN), Box::new(bad.clone()), None)
            .expect("add pool");

        let epoch_id = engine.define_push_epoch(oracle()).expect("define");
        assert!(matches!(
            engine.collect_interest(oracle(), epoch_id, 0, 2),
            Err(EngineError::RewardAssetMismatch { pool_id: 1, .. })
        ));
        assert_eq!(good.total_collected(), 0);
        assert_eq!(bad.total_collected(), 0);
        assert_eq!(engine.epoch(epoch_id).expect("epoch").state, EpochState::Defined);
    }

    #[test]
    fn test_failed_page_carries_delivered_reward() {
        let mut engine = engine();
        add_pool(&mut engine, 10, 30);
        let flaky = add_pool(&mut engine, 11, 20);
        flaky.fail_next_collect();

        let epoch_id = engine.define_push_epoch(oracle()).expect("define");
        let err = engine
            .collect_interest(oracle(), epoch_id, 0, 2)
            .expect_err("second pool reverts");
        assert_eq!(err.kind(), ErrorKind::Adapter);

        let epoch = engine.epoch(epoch_id).expect("epoch");
        assert_eq!(epoch.cursor, 0);
        assert_eq!(epoch.interest_earned, 0);
        assert_eq!(epoch.carried, 30);

        let report = engine.collect_interest(oracle(), epoch_id, 0, 2).expect("retry");
        assert_eq!(report.collected, 50);
        let epoch = engine.epoch(epoch_id).expect("epoch");
        assert_eq!(epoch.interest_earned, 50);
        assert_eq!(epoch.carried, 0);
        assert_eq!(engine.treasury().held(&addr(REWARD)), 50);
    }

    #[test]
    fn test_failed_page_overflow_is_reported() {
        let mut engine = engine();
        let big = u128::MAX - 5;
        let source = MemorySource::new(addr(10), addr(REWARD));
        source.accrue(big);
        engine
            .add_pool(addr(ADMIN), Box::new(source), None)
            .expect("add pool");
        add_pool(&mut engine, 11, 10);

        let epoch_id = engine.define_push_epoch(oracle()).expect("define");
        let err = engine
            .collect_interest(oracle(), epoch_id, 0, 2)
            .expect_err("totals overflow");
        assert_eq!(err.kind(), ErrorKind::Overflow);

        // The first pool's reward is carried exactly, never capped
        let epoch = engine.epoch(epoch_id).expect("epoch");
        assert_eq!(epoch.carried, big);
        assert_eq!(epoch.interest_earned, 0);
        assert_eq!(engine.treasury().held(&addr(REWARD)), big);
        assert_eq!(engine.pool(1).expect("pool").pending(), 10);
    }

    #[test]
    fn test_overcollection_is_an_adapter_fault() {
        let mut engine = engine();
        let source = add_pool(&mut engine, 10, 10);
        source.set_surplus(5);
        let epoch_id = engine.define_push_epoch(oracle()).expect("define");
        let err = engine
            .collect_interest(oracle(), epoch_id, 0, 1)
            .expect_err("overcollected");
        assert!(matches!(
            err,
            EngineError::Source {
                source: SourceError::Overcollected { available: 10, collected: 15 },
                ..
            }
        ));
        assert_eq!(engine.pool(0).expect("pool").pending(), 15);

        source.set_surplus(0);
        let report = engine.collect_interest(oracle(), epoch_id, 0, 1).expect("retry");
        assert_eq!(report.collected, 15);
    }

    #[test]
    fn test_proof_claims() {
        let mut engine = engine();
        add_pool(&mut engine, 10, 1_000);

        let alice = addr(500);
        let bob = addr(501);
        let tree = MerkleTree::from_allocations(&[(alice, 1), (bob, 3)]).expect("tree");
        let epoch_id = engine
            .define_epoch(oracle(), tree.root(), tree.total_shares())
            .expect("define");

        let alice_claim = Claim::new(epoch_id, 1, tree.proof(&alice).expect("proof"));
        assert!(matches!(
            engine.claim_reward(alice, &[alice_claim.clone()]),
            Err(EngineError::EpochNotFinalized { .. })
        ));
        assert!(engine.claim_proof_valid(&alice, &alice_claim));

        engine.collect_next_page(oracle(), epoch_id).expect("page");
        engine.finalize_epoch(oracle()).expect("finalize");

        assert_eq!(engine.claimable(&alice, &alice_claim).expect("claimable"), 250);
        let paid = engine.claim_reward(alice, &[alice_claim.clone()]).expect("claim");
        assert_eq!(paid[0].amount, 250);
        assert!(engine.is_claimed(epoch_id, &alice));
        assert!(matches!(
            engine.claim_reward(alice, &[alice_claim]),
            Err(EngineError::AlreadyClaimed { .. })
        ));

        // Bob cannot use Alice's proof or inflate his share.
        let forged = Claim::new(epoch_id, 4, tree.proof(&bob).expect("proof"));
        assert_eq!(
            engine.claim_reward(bob, &[forged]).expect_err("forged").kind(),
            ErrorKind::ProofInvalid
        );
        let bob_claim = Claim::new(epoch_id, 3, tree.proof(&bob).expect("proof"));
        assert_eq!(engine.claim_reward(bob, &[bob_claim]).expect("claim")[0].amount, 750);
        assert_eq!(engine.treasury().held(&addr(REWARD)), 0);
    }

    #[test]
    fn test_claims_capped_by_epoch_reward() {
        let mut engine = engine();
        add_pool(&mut engine, 10, 100);

        let alice = addr(500);
        let bob = addr(501);
        let tree = MerkleTree::from_allocations(&[(alice, 3), (bob, 3)]).expect("tree");
        // Committed total below the real sum of shares
        let epoch_id = engine
            .define_epoch(oracle(), tree.root(), 4)
            .expect("define");
        engine.collect_next_page(oracle(), epoch_id).expect("page");
        engine.finalize_epoch(oracle()).expect("finalize");

        let alice_claim = Claim::new(epoch_id, 3, tree.proof(&alice).expect("proof"));
        assert_eq!(engine.claim_reward(alice, &[alice_claim]).expect("claim")[0].amount, 75);
        assert_eq!(engine.epoch(epoch_id).expect("epoch").paid_out, 75);

        let bob_claim = Claim::new(epoch_id, 3, tree.proof(&bob).expect("proof"));
        let err = engine.claim_reward(bob, &[bob_claim]).expect_err("exhausted");
        assert!(matches!(
            err,
            EngineError::EpochExhausted {
                required: 75,
                remaining: 25,
                ..
            }
        ));
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
        assert!(!engine.is_claimed(epoch_id, &bob));
        assert_eq!(engine.treasury().held(&addr(REWARD)), 25);
    }

    #[test]
    fn test_shares_above_total_rejected() {
        let mut engine = engine();
        add_pool(&mut engine, 10, 100);

        let alice = addr(500);
        let tree = MerkleTree::from_allocations(&[(alice, 10)]).expect("tree");
        let epoch_id = engine
            .define_epoch(oracle(), tree.root(), 5)
            .expect("define");
        engine.collect_next_page(oracle(), epoch_id).expect("page");
        engine.finalize_epoch(oracle()).expect("finalize");

        let claim = Claim::new(epoch_id, 10, tree.proof(&alice).expect("proof"));
        assert!(engine.claim_proof_valid(&alice, &claim));
        assert!(matches!(
            engine.claim_reward(alice, &[claim]),
            Err(EngineError::SharesExceedTotal {
                share_units: 10,
                total_shares: 5,
                ..
            })
        ));
        assert_eq!(engine.treasury().paid(&addr(REWARD)), 0);
    }

    #[test]
    fn test_push_epoch_rejects_claims() {
        let mut engine = engine();
        let epoch_id = engine.define_push_epoch(oracle()).expect("define");
        engine.finalize_epoch(oracle()).expect("finalize");
        let claim = Claim::new(epoch_id, 1, Vec::new());
        assert!(matches!(
            engine.claim_reward(addr(9), &[claim.clone()]),
            Err(EngineError::WrongMode { expected: "proof", .. })
        ));
        assert!(!engine.claim_proof_valid(&addr(9), &claim));
    }

    #[test]
    fn test_distribute_interest() {
        let mut engine = engine();
        add_pool(&mut engine, 10, 100);
        let epoch_id = engine.define_push_epoch(oracle()).expect("define");
        engine.collect_interest(oracle(), epoch_id, 0, 1).expect("page");
        engine.finalize_epoch(oracle()).expect("finalize");

        let token = addr(REWARD);
        let err = engine
            .distribute_interest(oracle(), token, &[(addr(7), 60), (addr(8), 41)])
            .expect_err("exceeds balance");
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
        assert_eq!(engine.treasury().held(&token), 100);

        let total = engine
            .distribute_interest(oracle(), token, &[(addr(7), 60), (addr(8), 40)])
            .expect("distribute");
        assert_eq!(total, 100);
        assert_eq!(engine.treasury().paid(&token), 100);
        assert!(engine
            .distribute_interest(addr(ADMIN), token, &[])
            .is_err());
    }

    #[test]
    fn test_reward_token_locked_while_collecting() {
        let mut engine = engine();
        add_pool(&mut engine, 10, 1);
        add_pool(&mut engine, 11, 1);
        add_pool(&mut engine, 12, 1);
        let epoch_id = engine.define_push_epoch(oracle()).expect("define");

        // Still allowed before the first page.
        engine.set_reward_token(addr(ADMIN), addr(REWARD)).expect("set");
        engine.collect_interest(oracle(), epoch_id, 0, 2).expect("page");
        assert!(matches!(
            engine.set_reward_token(addr(ADMIN), addr(200)),
            Err(EngineError::RewardTokenLocked { epoch_id: 0 })
        ));
    }

    #[test]
    fn test_reward_token_locked_while_reward_carried() {
        let mut engine = engine();
        add_pool(&mut engine, 10, 30);
        let flaky = add_pool(&mut engine, 11, 20);
        flaky.fail_next_collect();

        let epoch_id = engine.define_push_epoch(oracle()).expect("define");
        engine
            .collect_interest(oracle(), epoch_id, 0, 2)
            .expect_err("second pool reverts");
        let epoch = engine.epoch(epoch_id).expect("epoch");
        assert_eq!(epoch.state, EpochState::Defined);
        assert_eq!(epoch.carried, 30);

        // 30 of the old token is already held for this epoch
        assert!(matches!(
            engine.set_reward_token(addr(ADMIN), addr(200)),
            Err(EngineError::RewardTokenLocked { epoch_id: 0 })
        ));
        assert_eq!(engine.reward_token(), addr(REWARD));

        engine.collect_interest(oracle(), epoch_id, 0, 2).expect("retry");
        engine.finalize_epoch(oracle()).expect("finalize");
        let epoch = engine.epoch(epoch_id).expect("epoch");
        assert_eq!(epoch.interest_earned, 50);
        assert_eq!(epoch.reward_token, Some(addr(REWARD)));
        assert_eq!(engine.treasury().held(&addr(REWARD)), 50);
    }

    #[test]
    fn test_account_rotation() {
        let mut engine = engine();
        engine.set_oracle_account(addr(ADMIN), addr(20)).expect("rotate oracle");
        assert!(engine.define_push_epoch(oracle()).is_err());
        engine.define_push_epoch(addr(20)).expect("new oracle");

        engine.set_admin_account(addr(ADMIN), addr(21)).expect("rotate admin");
        assert!(engine.set_oracle_account(addr(ADMIN), addr(22)).is_err());
        assert_eq!(engine.authority().admin, addr(21));
        assert!(matches!(
            engine.set_admin_account(addr(21), Address::ZERO),
            Err(EngineError::InvalidConfiguration(_))
        ));

        let names: Vec<_> = engine.drain_events().iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            vec!["oracle_account_changed", "epoch_defined", "admin_account_changed"]
        );
        assert!(engine.events().is_empty());
    }
}
