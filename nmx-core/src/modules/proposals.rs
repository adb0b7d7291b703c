// src/modules/proposals.rs

//! Voting shared by the contract and chain registries.
//!
//! A proposal opens for a fixed voting period. Each account may vote once
//! with its tokens bonded to bonded validators as weight. The first
//! BeginBlock at or after the end time tallies it: more yes than no
//! passes it, anything else rejects it. Each registry keeps its own
//! sequential ids, vote book and a queue of open proposals keyed by end
//! time, so tallying never walks closed proposals.

use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::events::{types, Event};
use crate::math::Int;
use crate::modules::staking::StakingKeeper;
use crate::time::Timestamp;
use nmx_crypto::AccAddress;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default length of a voting period
pub const DEFAULT_VOTING_PERIOD: Duration = Duration::from_secs(7 * 86_400);

/// Where a proposal stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum ProposalStatus {
    Voting,
    Passed,
    Rejected,
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProposalStatus::Voting => "voting",
            ProposalStatus::Passed => "passed",
            ProposalStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Ballot choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum VoteOption {
    Yes,
    No,
}

impl fmt::Display for VoteOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VoteOption::Yes => "yes",
            VoteOption::No => "no",
        })
    }
}

/// Voting state embedded in every registry proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voting {
    /// Status
    pub status: ProposalStatus,
    /// Power voted yes
    pub votes_yes: Int,
    /// Power voted no
    pub votes_no: Int,
    /// Submission time
    pub created_at: Timestamp,
    /// Votes are accepted up to and including this instant
    pub end_time: Timestamp,
}

impl Voting {
    /// Opens voting at `now` for `period`
    pub fn open(now: Timestamp, period: Duration) -> Self {
        Self {
            status: ProposalStatus::Voting,
            votes_yes: Int::ZERO,
            votes_no: Int::ZERO,
            created_at: now,
            end_time: now.add(period),
        }
    }

    /// Whether a vote at `now` is accepted
    pub fn accepts_votes(&self, now: Timestamp) -> bool {
        self.status == ProposalStatus::Voting && now <= self.end_time
    }

    /// Adds `power` to one side
    pub fn add(&mut self, option: VoteOption, power: Int) -> Result<()> {
        match option {
            VoteOption::Yes => self.votes_yes = self.votes_yes.checked_add(power)?,
            VoteOption::No => self.votes_no = self.votes_no.checked_add(power)?,
        }
        Ok(())
    }

    /// Closes voting and records the outcome
    pub fn tally(&mut self) -> ProposalStatus {
        self.status = if self.votes_yes > self.votes_no {
            ProposalStatus::Passed
        } else {
            ProposalStatus::Rejected
        };
        self.status
    }
}

/// One recorded ballot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    /// Proposal voted on
    pub proposal_id: u64,
    /// Voter
    pub voter: AccAddress,
    /// Choice
    pub option: VoteOption,
    /// Power at vote time
    pub power: Int,
}

/// Registry proposal carrying a [`Voting`]
pub(crate) trait Proposal: Serialize + DeserializeOwned {
    fn voting(&self) -> &Voting;
}

/// Key families of one registry's proposals, votes, open-proposal queue and id sequence
#[derive(Debug, Clone, Copy)]
pub(crate) struct ProposalBook {
    pub store: &'static str,
    pub proposals: u8,
    pub votes: u8,
    pub sequence: u8,
    pub queue: u8,
}

impl ProposalBook {
    fn proposal_key(&self, id: u64) -> Vec<u8> {
        crate::store::key(self.proposals, &[&id.to_be_bytes()])
    }

    fn queue_key(&self, end_time: Timestamp, id: u64) -> Vec<u8> {
        crate::store::key(self.queue, &[&end_time.to_key_bytes(), &id.to_be_bytes()])
    }

    fn vote_key(&self, id: u64, voter: &AccAddress) -> Vec<u8> {
        crate::store::key(self.votes, &[&id.to_be_bytes(), voter.as_bytes()])
    }

    /// Id the next proposal will get; ids start at 1
    pub fn next_id(&self, ctx: &mut Context<'_>) -> Result<u64> {
        Ok(ctx.kv(self.store).get::<u64>(&[self.sequence])?.unwrap_or(1))
    }

    pub fn set_next_id(&self, ctx: &mut Context<'_>, id: u64) -> Result<()> {
        ctx.kv(self.store).set(&[self.sequence], &id)
    }

    /// Takes the next id and advances the sequence
    pub fn allocate_id(&self, ctx: &mut Context<'_>) -> Result<u64> {
        let id = self.next_id(ctx)?;
        let next = id
            .checked_add(1)
            .ok_or_else(|| NmxError::Overflow("proposal id sequence".into()))?;
        self.set_next_id(ctx, next)?;
        Ok(id)
    }

    pub fn get<T: DeserializeOwned>(&self, ctx: &mut Context<'_>, id: u64) -> Result<Option<T>> {
        ctx.kv(self.store).get(&self.proposal_key(id))
    }

    /// Writes the proposal; while voting it is also queued under its end time
    pub fn set<T: Proposal>(&self, ctx: &mut Context<'_>, id: u64, proposal: &T) -> Result<()> {
        let voting = proposal.voting();
        let queued = self.queue_key(voting.end_time, id);
        let mut store = ctx.kv(self.store);
        store.set(&self.proposal_key(id), proposal)?;
        if voting.status == ProposalStatus::Voting {
            store.set_raw(&queued, Vec::new())
        } else {
            store.delete(&queued)
        }
    }

    /// Open proposals whose voting ended at or before `now`, by end time then id
    pub fn due<T: Proposal>(&self, ctx: &mut Context<'_>, now: Timestamp) -> Result<Vec<T>> {
        let keys = ctx.kv(self.store).iter_raw(&[self.queue])?;
        let mut out = Vec::new();
        for (k, _) in keys {
            let bad = || NmxError::StoreError(format!("bad proposal queue key {}", hex::encode(&k)));
            let mut raw = [0u8; 8];
            raw.copy_from_slice(k.get(1..9).ok_or_else(bad)?);
            if Timestamp::from_key_bytes(raw) > now {
                break;
            }
            raw.copy_from_slice(k.get(9..17).ok_or_else(bad)?);
            let id = u64::from_be_bytes(raw);
            let proposal: T = self
                .get(ctx, id)?
                .ok_or_else(|| NmxError::StoreError(format!("queued proposal {} is missing", id)))?;
            out.push(proposal);
        }
        Ok(out)
    }

    /// Every proposal in id order
    pub fn all<T: DeserializeOwned>(&self, ctx: &mut Context<'_>) -> Result<Vec<T>> {
        ctx.kv(self.store).values(&[self.proposals])
    }

    pub fn has_vote(&self, ctx: &mut Context<'_>, id: u64, voter: &AccAddress) -> Result<bool> {
        ctx.kv(self.store).has(&self.vote_key(id, voter))
    }

    pub fn set_vote(&self, ctx: &mut Context<'_>, vote: &Vote) -> Result<()> {
        ctx.kv(self.store).set(&self.vote_key(vote.proposal_id, &vote.voter), vote)
    }

    /// Votes on one proposal in voter order
    pub fn votes(&self, ctx: &mut Context<'_>, id: u64) -> Result<Vec<Vote>> {
        ctx.kv(self.store)
            .values(&crate::store::key(self.votes, &[&id.to_be_bytes()]))
    }

    pub fn all_votes(&self, ctx: &mut Context<'_>) -> Result<Vec<Vote>> {
        ctx.kv(self.store).values(&[self.votes])
    }
}

/// Checks and records a vote on an open proposal
///
/// # Returns
/// The voting power applied
pub(crate) fn cast_vote(
    book: &ProposalBook,
    staking: &StakingKeeper,
    ctx: &mut Context<'_>,
    proposal_id: u64,
    voting: &mut Voting,
    voter: &AccAddress,
    option: VoteOption,
) -> Result<Int> {
    if !voting.accepts_votes(ctx.block_time()) {
        return Err(NmxError::VotingClosed(format!(
            "proposal {} closed at {}",
            proposal_id,
            voting.end_time.to_rfc3339()
        )));
    }
    if book.has_vote(ctx, proposal_id, voter)? {
        return Err(NmxError::AlreadyVoted(format!("{} on proposal {}", voter, proposal_id)));
    }
    let power = staking.bonded_tokens_of(ctx, voter)?;
    if !power.is_positive() {
        return Err(NmxError::NoVotingPower(format!("{} has no bonded tokens", voter)));
    }
    voting.add(option, power)?;
    book.set_vote(
        ctx,
        &Vote {
            proposal_id,
            voter: *voter,
            option,
            power,
        },
    )?;
    ctx.emit(
        Event::new(types::PROPOSAL_VOTE)
            .attr("module", book.store)
            .attr("proposal_id", proposal_id)
            .attr("voter", voter)
            .attr("option", option)
            .attr("power", power),
    );
    Ok(power)
}

/// Stateless checks shared by proposal messages
pub(crate) fn validate_proposal_text(title: &str, description: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(NmxError::InvalidMessage("proposal title is empty".into()));
    }
    if title.len() > 140 {
        return Err(NmxError::InvalidMessage("proposal title is longer than 140 bytes".into()));
    }
    if description.len() > 10_000 {
        return Err(NmxError::InvalidMessage(
            "proposal description is longer than 10000 bytes".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::*;
    use crate::context::ExecMode;
    use crate::modules::staking::test_support::*;
    use crate::store::names;

    const BOOK: ProposalBook = ProposalBook {
        store: names::DYNACONTRACTS,
        proposals: 0x70,
        votes: 0x71,
        sequence: 0x72,
        queue: 0x73,
    };

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct TestProposal {
        id: u64,
        voting: Voting,
    }

    impl Proposal for TestProposal {
        fn voting(&self) -> &Voting {
            &self.voting
        }
    }

    fn create_test_proposal(id: u64, start: i64, period: u64) -> TestProposal {
        TestProposal {
            id,
            voting: Voting::open(Timestamp::from_unix_secs(start), Duration::from_secs(period)),
        }
    }

    fn create_test_voting(now: Timestamp) -> Voting {
        Voting::open(now, Duration::from_secs(100))
    }

    #[test]
    fn test_voting_window_boundaries() {
        let start = Timestamp::from_unix_secs(1_000);
        let voting = create_test_voting(start);
        let end = Timestamp::from_unix_secs(1_100);
        assert_eq!(voting.end_time, end);
        assert!(voting.accepts_votes(end));
        assert!(!voting.accepts_votes(Timestamp::from_unix_secs(1_101)));
    }

    #[test]
    fn test_tally_requires_strict_majority() {
        let mut voting = create_test_voting(Timestamp::EPOCH);
        voting.add(VoteOption::Yes, Int::new(400)).unwrap();
        voting.add(VoteOption::No, Int::new(400)).unwrap();
        assert_eq!(voting.clone().tally(), ProposalStatus::Rejected);
        voting.add(VoteOption::Yes, Int::new(1)).unwrap();
        assert_eq!(voting.tally(), ProposalStatus::Passed);
        assert!(!voting.accepts_votes(Timestamp::EPOCH));
    }

    #[test]
    fn test_ids_are_sequential() {
        let mut store = create_test_store();
        let mut ctx = Context::new(&mut store, create_test_header(1), ExecMode::Deliver);
        assert_eq!(BOOK.allocate_id(&mut ctx).unwrap(), 1);
        assert_eq!(BOOK.allocate_id(&mut ctx).unwrap(), 2);
        assert_eq!(BOOK.next_id(&mut ctx).unwrap(), 3);
    }

    #[test]
    fn test_cast_vote_rules() {
        let mut store = create_test_store();
        let mut ctx = Context::new(&mut store, create_test_header(1), ExecMode::Deliver);
        let staking = create_test_staking();
        let val = create_bonded_validator(&staking, &mut ctx, 1, 1_000_000);
        let operator = staking.validator(&mut ctx, &val).unwrap().operator_account();
        let mut voting = create_test_voting(ctx.block_time());

        let power = cast_vote(&BOOK, &staking, &mut ctx, 1, &mut voting, &operator, VoteOption::Yes).unwrap();
        assert_eq!(power, Int::new(1_000_000));
        assert_eq!(voting.votes_yes, Int::new(1_000_000));
        assert!(matches!(
            cast_vote(&BOOK, &staking, &mut ctx, 1, &mut voting, &operator, VoteOption::No),
            Err(NmxError::AlreadyVoted(_))
        ));
        assert!(matches!(
            cast_vote(&BOOK, &staking, &mut ctx, 1, &mut voting, &AccAddress::new([42u8; 20]), VoteOption::No),
            Err(NmxError::NoVotingPower(_))
        ));
        assert_eq!(BOOK.votes(&mut ctx, 1).unwrap().len(), 1);

        voting.end_time = Timestamp::EPOCH;
        assert!(matches!(
            cast_vote(&BOOK, &staking, &mut ctx, 2, &mut voting, &operator, VoteOption::Yes),
            Err(NmxError::VotingClosed(_))
        ));
    }

    #[test]
    fn test_unbonded_stake_has_no_weight() {
        let mut store = create_test_store();
        let mut ctx = Context::new(&mut store, create_test_header(1), ExecMode::Deliver);
        let staking = create_test_staking();
        let val = create_bonded_validator(&staking, &mut ctx, 1, 1_000_000);
        let mut validator = staking.validator(&mut ctx, &val).unwrap();
        staking.jail(&mut ctx, &mut validator).unwrap();
        staking.apply_validator_set_updates(&mut ctx).unwrap();
        assert!(!staking.validator(&mut ctx, &val).unwrap().is_bonded());

        let operator = validator.operator_account();
        let mut voting = create_test_voting(ctx.block_time());
        assert!(matches!(
            cast_vote(&BOOK, &staking, &mut ctx, 1, &mut voting, &operator, VoteOption::Yes),
            Err(NmxError::NoVotingPower(_))
        ));
    }

    #[test]
    fn test_queue_holds_only_open_proposals() {
        let mut store = create_test_store();
        let mut ctx = Context::new(&mut store, create_test_header(1), ExecMode::Deliver);
        BOOK.set(&mut ctx, 1, &create_test_proposal(1, 0, 300)).unwrap();
        BOOK.set(&mut ctx, 2, &create_test_proposal(2, 0, 100)).unwrap();
        BOOK.set(&mut ctx, 3, &create_test_proposal(3, 0, 500)).unwrap();

        let due: Vec<u64> = BOOK
            .due::<TestProposal>(&mut ctx, Timestamp::from_unix_secs(300))
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(due, vec![2, 1]);

        let mut closed = create_test_proposal(2, 0, 100);
        closed.voting.tally();
        BOOK.set(&mut ctx, 2, &closed).unwrap();
        let due: Vec<u64> = BOOK
            .due::<TestProposal>(&mut ctx, Timestamp::MAX)
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(due, vec![1, 3]);
        assert_eq!(BOOK.all::<TestProposal>(&mut ctx).unwrap().len(), 3);
    }
}
