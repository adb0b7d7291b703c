// src/tests/integration.rs

//! Integration tests for the NMX application
//!
//! Every test starts from a genesis with one bonded validator and a handful
//! of funded accounts, then feeds blocks through the consensus ABI the way
//! a host would: BeginBlock with the previous commit's votes and any
//! evidence, signed transactions, EndBlock and Commit.

#[cfg(test)]
mod tests {
    use crate::abci::{
        Header, LastCommitInfo, Misbehavior, MisbehaviorType, RequestBeginBlock, RequestEndBlock, RequestInitChain,
        RequestQuery, ResponseDeliverTx, ResponseEndBlock, VoteInfo, VoteValidator,
    };
    use crate::abci::{CheckTxType, ConsensusParams};
    use crate::app::{App, AppOptions};
    use crate::codec;
    use crate::coins::{Coin, Coins};
    use crate::context::{BlockHeader, Context, ExecMode};
    use crate::errors::NmxError;
    use crate::genesis::{AppState, GenesisDoc};
    use crate::math::{Dec, Int};
    use crate::modules::auth::{default_module_permissions, module_accounts, Account, AuthKeeper};
    use crate::modules::bank::{Balance, BankKeeper, MsgSend};
    use crate::modules::hyperchains::{
        ChainStatus, ChainType, HyperChainsKeeper, MsgCreateChain, MsgDeployChain, MsgSubmitChainProposal,
        MsgVoteChainProposal, ProposalType,
    };
    use crate::modules::neuropos::reputation::{REASON_PERFORMANCE, REASON_TOMBSTONED};
    use crate::modules::neuropos::NeuroPoSKeeper;
    use crate::modules::proposals::{ProposalStatus, VoteOption};
    use crate::modules::slashing::{MsgUnjail, SlashingKeeper};
    use crate::modules::staking::{
        BondStatus, CommissionRates, Description, MsgBeginRedelegate, MsgCreateValidator, MsgDelegate,
        MsgEditValidator, MsgUndelegate, StakingKeeper, Validator,
    };
    use crate::modules::truthgpt::{
        DataSourceType, MsgCreateOracleQuery, MsgRegisterDataSource, QueryStatus, TruthGptKeeper,
    };
    use crate::store::VersionedStore;
    use crate::time::Timestamp;
    use crate::tx::{Msg, TxBuilder};
    use crate::BOND_DENOM;
    use nmx_crypto::{AccAddress, ConsAddress, KeyPair, ValAddress};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::BTreeMap;
    use std::time::Duration;

    const CHAIN_ID: &str = "nmx-itest";
    const GENESIS_SECS: i64 = 1_700_000_000;
    const BLOCK_TIME: Duration = Duration::from_secs(5);
    const INITIAL_BALANCE: i128 = 10_000_000;
    const SELF_BOND: i128 = 1_000_000;
    const ACTORS: [&str; 7] = ["v1", "v2", "delegator", "voter", "requester", "owner1", "owner2"];

    struct Actor {
        key: KeyPair,
        number: u64,
        sequence: u64,
    }

    impl Actor {
        fn address(&self) -> AccAddress {
            self.key.account_address()
        }

        fn operator(&self) -> ValAddress {
            ValAddress::from(self.address())
        }

        fn cons(&self) -> ConsAddress {
            self.key.public_key.consensus_address()
        }
    }

    /// Stateless keepers for reading committed state
    struct Readers {
        bank: BankKeeper,
        staking: StakingKeeper,
        slashing: SlashingKeeper,
        neuropos: NeuroPoSKeeper,
        truthgpt: TruthGptKeeper,
        hyperchains: HyperChainsKeeper,
    }

    fn create_test_readers() -> Readers {
        let bank = BankKeeper::new(AuthKeeper::new(default_module_permissions()));
        let staking = StakingKeeper::new(bank.clone());
        Readers {
            slashing: SlashingKeeper::new(staking.clone()),
            neuropos: NeuroPoSKeeper::new(staking.clone()),
            truthgpt: TruthGptKeeper::new(bank.clone()),
            hyperchains: HyperChainsKeeper::new(staking.clone()),
            staking,
            bank,
        }
    }

    /// One application plus the host-side state needed to drive it
    struct Network {
        app: App,
        actors: BTreeMap<&'static str, Actor>,
        readers: Readers,
        time: Timestamp,
        proposer: ConsAddress,
        votes: Vec<VoteInfo>,
        evidence: Vec<Misbehavior>,
        last_end_block: ResponseEndBlock,
    }

    fn create_validator_msg(actor: &Actor, moniker: &str, self_bond: i128) -> MsgCreateValidator {
        MsgCreateValidator {
            description: Description::with_moniker(moniker),
            commission: CommissionRates {
                rate: Dec::percent(10),
                max_rate: Dec::percent(20),
                max_change_rate: Dec::percent(1),
            },
            min_self_delegation: Int::new(SELF_BOND),
            delegator_address: actor.address(),
            validator_address: actor.operator(),
            pubkey: actor.key.public_key,
            value: Coin::new(BOND_DENOM, Int::new(self_bond)),
        }
    }

    /// Genesis with every actor funded and `v1` bonded with 1 000 000
    fn create_test_network(customize: impl FnOnce(&mut AppState)) -> Network {
        let actors: BTreeMap<&'static str, Actor> = ACTORS
            .iter()
            .enumerate()
            .map(|(number, name)| {
                (
                    *name,
                    Actor {
                        key: KeyPair::from_label(name),
                        number: number as u64,
                        sequence: 0,
                    },
                )
            })
            .collect();

        let mut state = AppState::default();
        for actor in actors.values() {
            state.auth.accounts.push(Account {
                address: actor.address(),
                pub_key: None,
                account_number: actor.number,
                sequence: 0,
                module: None,
            });
            state.bank.balances.push(Balance {
                address: actor.address(),
                coins: Coins::single(BOND_DENOM, Int::new(INITIAL_BALANCE)),
            });
        }
        state
            .genutil
            .gen_msgs
            .push(create_validator_msg(&actors["v1"], "validator-one", SELF_BOND));
        customize(&mut state);

        let time = Timestamp::from_unix_secs(GENESIS_SECS);
        let mut app = App::new(AppOptions {
            chain_id: CHAIN_ID.into(),
            ..Default::default()
        })
        .unwrap();
        let resp = app
            .init_chain(RequestInitChain {
                time,
                chain_id: CHAIN_ID.into(),
                consensus_params: ConsensusParams::default(),
                validators: Vec::new(),
                app_state_bytes: state.to_json().unwrap(),
                initial_height: 1,
            })
            .unwrap();
        assert_eq!(resp.validators.len(), 1);
        assert_eq!(resp.validators[0].power, 1_000);

        let proposer = actors["v1"].cons();
        Network {
            app,
            actors,
            readers: create_test_readers(),
            time,
            proposer,
            votes: Vec::new(),
            evidence: Vec::new(),
            last_end_block: ResponseEndBlock::default(),
        }
    }

    impl Network {
        fn actor(&self, name: &str) -> &Actor {
            &self.actors[name]
        }

        fn sign(&mut self, name: &str, msgs: Vec<Msg>) -> Vec<u8> {
            let actor = self.actors.get_mut(name).unwrap();
            let mut builder = TxBuilder::new().gas_limit(5_000_000);
            for msg in msgs {
                builder = builder.msg(msg);
            }
            let tx = builder
                .sign(&actor.key, CHAIN_ID, actor.number, actor.sequence)
                .unwrap();
            actor.sequence += 1;
            tx.encode().unwrap()
        }

        /// Runs one block holding the given transactions
        fn block(&mut self, txs: Vec<(&str, Vec<Msg>)>) -> Vec<ResponseDeliverTx> {
            let signed: Vec<Vec<u8>> = txs.into_iter().map(|(name, msgs)| self.sign(name, msgs)).collect();
            self.block_raw(signed)
        }

        fn block_raw(&mut self, txs: Vec<Vec<u8>>) -> Vec<ResponseDeliverTx> {
            let height = self.app.last_height() + 1;
            self.time = self.time.add(BLOCK_TIME);
            self.app
                .begin_block(RequestBeginBlock {
                    header: Header {
                        chain_id: CHAIN_ID.into(),
                        height,
                        time: self.time,
                        proposer_address: self.proposer,
                    },
                    last_commit_info: LastCommitInfo {
                        round: 0,
                        votes: self.votes.clone(),
                    },
                    byzantine_validators: std::mem::take(&mut self.evidence),
                })
                .unwrap();
            let responses = txs.iter().map(|tx| self.app.deliver_tx(tx).unwrap()).collect();
            self.last_end_block = self.app.end_block(RequestEndBlock { height }).unwrap();
            self.app.commit().unwrap();
            responses
        }

        /// Runs one block and asserts every transaction succeeded
        fn block_ok(&mut self, txs: Vec<(&str, Vec<Msg>)>) -> Vec<ResponseDeliverTx> {
            let responses = self.block(txs);
            for resp in &responses {
                assert!(resp.is_ok(), "tx failed with code {}: {}", resp.code, resp.log);
            }
            responses
        }

        fn advance(&mut self, blocks: u64) {
            for _ in 0..blocks {
                self.block(Vec::new());
            }
        }

        /// Delays the next block by `gap` on top of the block time
        fn skip(&mut self, gap: Duration) {
            self.time = self.time.add(gap);
        }

        fn vote_as(&mut self, name: &str, power: i64, signed: bool) {
            let address = self.actor(name).cons();
            self.votes = vec![VoteInfo {
                validator: VoteValidator { address, power },
                signed_last_block: signed,
            }];
        }

        fn read<T>(&self, f: impl FnOnce(&Readers, &mut Context<'_>) -> T) -> T {
            let mut view = VersionedStore::from_snapshot(self.app.store().latest());
            let header = BlockHeader {
                chain_id: CHAIN_ID.into(),
                height: self.app.last_height(),
                time: self.time,
                proposer: ConsAddress::new([0u8; 20]),
            };
            let mut ctx = Context::new(&mut view, header, ExecMode::Query);
            f(&self.readers, &mut ctx)
        }

        fn balance(&self, addr: &AccAddress) -> Int {
            self.read(|r, ctx| r.bank.get_balance(ctx, addr, BOND_DENOM).unwrap())
        }

        fn module_balance(&self, module: &str) -> Int {
            let addr = self.readers.bank.auth().module_address(module);
            self.balance(&addr)
        }

        fn validator(&self, name: &str) -> Validator {
            let operator = self.actor(name).operator();
            self.read(|r, ctx| r.staking.validator(ctx, &operator).unwrap())
        }
    }

    fn unmx(amount: i128) -> Coin {
        Coin::new(BOND_DENOM, Int::new(amount))
    }

    fn delegate_msg(net: &Network, from: &str, to: &str, amount: i128) -> Msg {
        MsgDelegate {
            delegator_address: net.actor(from).address(),
            validator_address: net.actor(to).operator(),
            amount: unmx(amount),
        }
        .into()
    }

    fn undelegate_msg(net: &Network, from: &str, to: &str, amount: i128) -> Msg {
        MsgUndelegate {
            delegator_address: net.actor(from).address(),
            validator_address: net.actor(to).operator(),
            amount: unmx(amount),
        }
        .into()
    }

    fn unjail_msg(net: &Network, name: &str) -> Msg {
        MsgUnjail {
            validator_address: net.actor(name).operator(),
        }
        .into()
    }

    fn code_of(err: NmxError) -> u32 {
        err.code()
    }

    #[test]
    fn test_bootstrap_and_delegate() {
        let mut net = create_test_network(|_| {});
        let msg = delegate_msg(&net, "delegator", "v1", 500_000);
        let responses = net.block_ok(vec![("delegator", vec![msg])]);
        let shares: Dec = codec::decode(&responses[0].data).unwrap();
        assert_eq!(shares, Dec::from_int(500_000));

        let v1 = net.validator("v1");
        assert_eq!(v1.tokens, Int::new(1_500_000));
        assert_eq!(v1.delegator_shares, Dec::from_int(1_500_000));
        assert_eq!(v1.status, BondStatus::Bonded);

        let (delegator, operator) = (net.actor("delegator").address(), net.actor("v1").operator());
        let delegation = net
            .read(|r, ctx| r.staking.get_delegation(ctx, &delegator, &operator).unwrap())
            .unwrap();
        assert_eq!(delegation.shares, Dec::from_int(500_000));
        assert_eq!(net.module_balance(module_accounts::BONDED_POOL), Int::new(1_500_000));
        assert_eq!(net.balance(&delegator), Int::new(INITIAL_BALANCE - 500_000));

        let updates = &net.last_end_block.validator_updates;
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].pub_key, net.actor("v1").key.public_key);
        assert_eq!(updates[0].power, 1_500);
        net.app.check_invariants().unwrap();
    }

    #[test]
    fn test_downtime_jailing() {
        let mut net = create_test_network(|state| {
            state.slashing.params.signed_blocks_window = 100;
            state.slashing.params.min_signed_per_window = Dec::percent(50);
        });
        let msg = delegate_msg(&net, "delegator", "v1", 500_000);
        net.block_ok(vec![("delegator", vec![msg])]);

        net.vote_as("v1", 1_500, false);
        net.advance(50);
        let cons = net.actor("v1").cons();
        let info = net.read(|r, ctx| r.slashing.signing_info(ctx, &cons).unwrap()).unwrap();
        assert_eq!(info.missed_blocks_counter, 50);
        assert!(!net.validator("v1").jailed);

        net.advance(1);
        let v1 = net.validator("v1");
        assert!(v1.jailed);
        assert_eq!(v1.tokens, Int::new(1_485_000));
        assert_eq!(v1.delegator_shares, Dec::from_int(1_500_000));
        assert_eq!(net.last_end_block.validator_updates.len(), 1);
        assert_eq!(net.last_end_block.validator_updates[0].power, 0);

        let info = net.read(|r, ctx| r.slashing.signing_info(ctx, &cons).unwrap()).unwrap();
        assert_eq!(info.missed_blocks_counter, 0);
        assert_eq!(info.jailed_until, net.time.add(Duration::from_secs(86_400)));

        let operator = v1.operator_address;
        let reputation = net.read(|r, ctx| r.neuropos.reputation(ctx, &operator).unwrap());
        let downtime: Vec<_> = reputation
            .history
            .iter()
            .filter(|c| c.reason == "slash: downtime")
            .collect();
        assert_eq!(downtime.len(), 1);
        assert_eq!(downtime[0].change, -Dec::from_ratio(2, 10_000));
        assert_eq!(reputation.reputation, Dec::ONE - Dec::from_ratio(2, 10_000));

        net.votes.clear();
        let msg = unjail_msg(&net, "v1");
        let early = net.block(vec![("v1", vec![msg])]);
        assert_eq!(early[0].code, code_of(NmxError::ValidatorJailed(String::new())));

        // the downtime slash left the self-bond under its minimum
        net.skip(Duration::from_secs(86_400));
        let msg = unjail_msg(&net, "v1");
        let late = net.block(vec![("v1", vec![msg])]);
        assert_eq!(late[0].code, code_of(NmxError::SelfDelegationBelowMinimum(String::new())));
        net.app.check_invariants().unwrap();
    }

    #[test]
    fn test_jail_threshold_and_jailed_validator() {
        let mut net = create_test_network(|state| {
            state.slashing.params.signed_blocks_window = 10;
            state.slashing.params.min_signed_per_window = Dec::percent(50);
        });
        net.vote_as("v1", 1_000, false);
        net.advance(5);
        assert!(!net.validator("v1").jailed);
        net.advance(1);
        let v1 = net.validator("v1");
        assert!(v1.jailed);
        assert_eq!(v1.tokens, Int::new(990_000));
        assert_eq!(v1.status, BondStatus::Unbonding);

        net.votes.clear();
        let top_up = delegate_msg(&net, "delegator", "v1", 20_000);
        let responses = net.block(vec![("delegator", vec![top_up])]);
        assert_eq!(responses[0].code, code_of(NmxError::ValidatorNotBonded(String::new())));
        net.app.check_invariants().unwrap();
    }

    #[test]
    fn test_double_sign_tombstones() {
        let mut net = create_test_network(|_| {});
        let msg = delegate_msg(&net, "delegator", "v1", 500_000);
        net.block_ok(vec![("delegator", vec![msg])]);
        net.advance(1);
        let infraction_time = net.time;

        let evidence = Misbehavior {
            kind: MisbehaviorType::DuplicateVote,
            validator: VoteValidator {
                address: net.actor("v1").cons(),
                power: 1_500,
            },
            height: 2,
            time: infraction_time,
            total_voting_power: 1_500,
        };
        net.evidence.push(evidence.clone());
        net.advance(1);

        let v1 = net.validator("v1");
        assert!(v1.jailed);
        assert_eq!(v1.tokens, Int::new(1_425_000));
        assert_eq!(v1.delegator_shares, Dec::from_int(1_500_000));
        let cons = net.actor("v1").cons();
        let info = net.read(|r, ctx| r.slashing.signing_info(ctx, &cons).unwrap()).unwrap();
        assert!(info.tombstoned);
        assert_eq!(info.jailed_until, Timestamp::MAX);

        let operator = v1.operator_address;
        let reputation = net.read(|r, ctx| r.neuropos.reputation(ctx, &operator).unwrap());
        assert_eq!(reputation.reputation, Dec::ZERO);
        let reasons: Vec<&str> = reputation.history.iter().map(|c| c.reason.as_str()).collect();
        assert_eq!(reasons, vec!["slash: double-sign", REASON_TOMBSTONED]);

        // replayed evidence is ignored
        net.evidence.push(evidence);
        net.advance(1);
        assert_eq!(net.validator("v1").tokens, Int::new(1_425_000));

        net.skip(Duration::from_secs(365 * 86_400));
        let msg = unjail_msg(&net, "v1");
        let responses = net.block(vec![("v1", vec![msg])]);
        assert_eq!(responses[0].code, code_of(NmxError::ValidatorJailed(String::new())));
        net.app.check_invariants().unwrap();
    }

    #[test]
    fn test_reputation_window() {
        let mut net = create_test_network(|state| {
            state.neuropos.params.performance_assessment_window = 10;
        });
        let operator = net.actor("v1").operator();

        // three proposed blocks count six, four signed blocks count four more
        net.advance(1);
        net.vote_as("v1", 1_000, true);
        net.advance(2);
        net.proposer = ConsAddress::new([9u8; 20]);
        net.advance(3);
        let history = net.read(|r, ctx| r.neuropos.reputation(ctx, &operator).unwrap().history);
        assert!(history.is_empty());
        let performance = net.read(|r, ctx| r.neuropos.performance(ctx, &operator).unwrap());
        assert_eq!((performance.blocks_proposed, performance.blocks_validated), (3, 6));

        net.advance(1);
        let reputation = net.read(|r, ctx| r.neuropos.reputation(ctx, &operator).unwrap());
        assert_eq!(reputation.history.len(), 1);
        assert_eq!(reputation.history[0].reason, REASON_PERFORMANCE);
        assert_eq!(reputation.history[0].change, Dec::from_ratio(5, 1_000));
        assert_eq!(reputation.reputation, Dec::ONE);

        let performance = net.read(|r, ctx| r.neuropos.performance(ctx, &operator).unwrap());
        assert_eq!(performance.performance_score, Dec::ONE);
        assert_eq!(performance.total_blocks(), 0);
        assert_eq!(performance.last_assessment_height, 7);
    }

    #[test]
    fn test_oracle_query_completion() {
        let mut net = create_test_network(|_| {});
        let register = |net: &Network, owner: &str| -> Msg {
            MsgRegisterDataSource {
                owner: net.actor(owner).address(),
                name: format!("{}-feed", owner),
                description: String::new(),
                source_type: DataSourceType::Api,
                endpoint: format!("https://{}.example", owner),
                metadata: Vec::new(),
            }
            .into()
        };
        let (r1, r2) = (register(&net, "owner1"), register(&net, "owner2"));
        let responses = net.block_ok(vec![("owner1", vec![r1]), ("owner2", vec![r2])]);
        let s1: String = codec::decode(&responses[0].data).unwrap();
        let s2: String = codec::decode(&responses[1].data).unwrap();
        assert_ne!(s1, s2);

        let query: Msg = MsgCreateOracleQuery {
            requester: net.actor("requester").address(),
            query_type: "price".into(),
            query: "NMX/USD".into(),
            data_sources: vec![s1.clone(), s2.clone()],
            fee: Coins::single(BOND_DENOM, Int::new(100)),
            callback_data: Vec::new(),
        }
        .into();
        let responses = net.block_ok(vec![("requester", vec![query])]);
        let query_id: String = codec::decode(&responses[0].data).unwrap();
        let requester = net.actor("requester").address();
        assert_eq!(net.balance(&requester), Int::new(INITIAL_BALANCE - 100));
        assert_eq!(net.module_balance(module_accounts::TRUTHGPT), Int::new(100));
        let pending = net.read(|r, ctx| r.truthgpt.query(ctx, &query_id).unwrap());
        assert_eq!(pending.status, QueryStatus::Pending);

        net.advance(1);
        let completed = net.read(|r, ctx| r.truthgpt.query(ctx, &query_id).unwrap());
        assert_eq!(completed.status, QueryStatus::Completed);
        let response_id = completed.response_id.clone().unwrap();
        let response = net.read(|r, ctx| r.truthgpt.response(ctx, &response_id).unwrap());
        assert_eq!(response.confidence, Dec::percent(90));

        for owner in ["owner1", "owner2"] {
            let addr = net.actor(owner).address();
            assert_eq!(net.balance(&addr), Int::new(INITIAL_BALANCE + 50));
        }
        assert_eq!(net.module_balance(module_accounts::TRUTHGPT), Int::ZERO);
        net.app.check_invariants().unwrap();
    }

    #[test]
    fn test_chain_proposal_lifecycle() {
        let mut net = create_test_network(|state| {
            state.hyperchains.params.voting_period = Duration::from_secs(10);
        });
        let yes = delegate_msg(&net, "delegator", "v1", 1_000);
        let no = delegate_msg(&net, "voter", "v1", 400);
        let create: Msg = MsgCreateChain {
            creator: net.actor("owner1").address(),
            name: "orbit".into(),
            description: "payments rollup".into(),
            chain_type: ChainType::Rollup,
            modules: vec!["core".into(), "token".into()],
            config: r#"{"block_time":2}"#.into(),
            metadata: String::new(),
        }
        .into();
        let responses = net.block_ok(vec![("delegator", vec![yes]), ("voter", vec![no]), ("owner1", vec![create])]);
        let chain_id: String = codec::decode(&responses[2].data).unwrap();

        let deploy: Msg = MsgDeployChain {
            deployer: net.actor("owner1").address(),
            chain_id: chain_id.clone(),
        }
        .into();
        net.block_ok(vec![("owner1", vec![deploy])]);
        let mut waited = 0;
        while net.read(|r, ctx| r.hyperchains.chain(ctx, &chain_id).unwrap().status) != ChainStatus::Active {
            assert!(waited < 5, "chain never became active");
            net.advance(1);
            waited += 1;
        }

        let submit: Msg = MsgSubmitChainProposal {
            proposer: net.actor("delegator").address(),
            chain_id: chain_id.clone(),
            title: "Runtime v2".into(),
            description: String::new(),
            proposal_type: ProposalType::Upgrade,
            content: String::new(),
        }
        .into();
        let responses = net.block_ok(vec![("delegator", vec![submit])]);
        let proposal_id: u64 = codec::decode(&responses[0].data).unwrap();
        let end_time = net.time.add(Duration::from_secs(10));

        let vote = |net: &Network, voter: &str, option| -> Msg {
            MsgVoteChainProposal {
                voter: net.actor(voter).address(),
                proposal_id,
                option,
            }
            .into()
        };
        let (v_yes, v_no) = (vote(&net, "delegator", VoteOption::Yes), vote(&net, "voter", VoteOption::No));
        net.block_ok(vec![("delegator", vec![v_yes]), ("voter", vec![v_no])]);
        let proposal = net.read(|r, ctx| r.hyperchains.proposal(ctx, proposal_id).unwrap());
        assert_eq!(proposal.voting.status, ProposalStatus::Voting);
        assert_eq!(proposal.voting.end_time, end_time);

        net.advance(1);
        assert!(net.time >= end_time);
        let proposal = net.read(|r, ctx| r.hyperchains.proposal(ctx, proposal_id).unwrap());
        assert_eq!(proposal.voting.status, ProposalStatus::Passed);
        assert_eq!(proposal.voting.votes_yes, Int::new(1_000));
        assert_eq!(proposal.voting.votes_no, Int::new(400));
        let chain = net.read(|r, ctx| r.hyperchains.chain(ctx, &chain_id).unwrap());
        assert_eq!(chain.version, 2);
        assert_eq!(chain.status, ChainStatus::Upgrading);
    }

    #[test]
    fn test_delegate_undelegate_returns_tokens() {
        let mut net = create_test_network(|state| {
            state.staking.params.unbonding_time = Duration::from_secs(20);
        });
        let delegator = net.actor("delegator").address();
        let operator = net.actor("v1").operator();

        let msg = delegate_msg(&net, "delegator", "v1", 250_000);
        net.block_ok(vec![("delegator", vec![msg])]);
        let msg = undelegate_msg(&net, "delegator", "v1", 250_000);
        let responses = net.block_ok(vec![("delegator", vec![msg])]);
        let completion: Timestamp = codec::decode(&responses[0].data).unwrap();
        assert_eq!(completion, net.time.add(Duration::from_secs(20)));

        // undelegating the whole delegation removes it
        assert!(net
            .read(|r, ctx| r.staking.get_delegation(ctx, &delegator, &operator).unwrap())
            .is_none());
        assert_eq!(net.balance(&delegator), Int::new(INITIAL_BALANCE - 250_000));
        assert_eq!(net.module_balance(module_accounts::NOT_BONDED_POOL), Int::new(250_000));

        net.advance(3);
        assert_eq!(net.balance(&delegator), Int::new(INITIAL_BALANCE - 250_000));
        net.advance(1);
        assert!(net.time >= completion);
        assert_eq!(net.balance(&delegator), Int::new(INITIAL_BALANCE));
        assert!(net
            .read(|r, ctx| r.staking.get_unbonding(ctx, &delegator, &operator).unwrap())
            .is_none());
        assert_eq!(net.module_balance(module_accounts::NOT_BONDED_POOL), Int::ZERO);
        net.app.check_invariants().unwrap();
    }

    #[test]
    fn test_create_validator_then_query() {
        let mut net = create_test_network(|_| {});
        let mut msg = create_validator_msg(net.actor("v2"), "validator-two", 2_000_000);
        msg.description.website = "https://two.example".into();
        msg.commission = CommissionRates {
            rate: Dec::percent(5),
            max_rate: Dec::percent(50),
            max_change_rate: Dec::percent(2),
        };
        msg.min_self_delegation = Int::new(1_500_000);
        let responses = net.block_ok(vec![("v2", vec![msg.clone().into()])]);
        let operator: ValAddress = codec::decode(&responses[0].data).unwrap();
        assert_eq!(operator, net.actor("v2").operator());

        let resp = net.app.query(&RequestQuery {
            path: "custom/staking/validator".into(),
            data: serde_json::to_vec(&serde_json::json!({ "address": operator })).unwrap(),
            ..Default::default()
        });
        assert_eq!(resp.code, 0, "{}", resp.log);
        assert_eq!(resp.height, net.app.last_height());
        let validator: Validator = serde_json::from_slice(&resp.value).unwrap();
        assert_eq!(validator.description, msg.description);
        assert_eq!(validator.commission.rates, msg.commission);
        assert_eq!(validator.min_self_delegation, msg.min_self_delegation);
        assert_eq!(validator.status, BondStatus::Bonded);
        assert_eq!(net.app.store().latest().height, 1);
    }

    #[test]
    fn test_genesis_export_import_reproduces_app_hash() {
        let mut net = create_test_network(|state| {
            state.staking.params.unbonding_time = Duration::from_secs(3_600);
        });
        let register: Msg = MsgRegisterDataSource {
            owner: net.actor("owner1").address(),
            name: "feed".into(),
            description: String::new(),
            source_type: DataSourceType::Api,
            endpoint: "https://feed.example".into(),
            metadata: Vec::new(),
        }
        .into();
        let delegate = delegate_msg(&net, "delegator", "v1", 300_000);
        let send: Msg = MsgSend {
            from_address: net.actor("voter").address(),
            to_address: net.actor("requester").address(),
            amount: Coins::single(BOND_DENOM, Int::new(1_234)),
        }
        .into();
        net.block_ok(vec![("owner1", vec![register]), ("delegator", vec![delegate]), ("voter", vec![send])]);
        net.vote_as("v1", 1_300, true);
        let undelegate = undelegate_msg(&net, "delegator", "v1", 100_000);
        net.block_ok(vec![("delegator", vec![undelegate])]);
        net.vote_as("v1", 1_200, false);
        net.advance(3);
        assert_eq!(net.app.last_height(), 5);

        let doc = net.app.export_genesis().unwrap();
        assert_eq!(doc.initial_height, 6);
        assert_eq!(doc.genesis_time, net.time);
        let json = serde_json::to_vec(&doc).unwrap();
        let doc: GenesisDoc = serde_json::from_slice(&json).unwrap();
        doc.validate().unwrap();

        let mut imported = App::new(AppOptions::default()).unwrap();
        let resp = imported
            .init_chain(RequestInitChain {
                time: doc.genesis_time,
                chain_id: doc.chain_id.clone(),
                consensus_params: doc.consensus_params.clone(),
                validators: Vec::new(),
                app_state_bytes: doc.app_state.to_json().unwrap(),
                initial_height: doc.initial_height,
            })
            .unwrap();
        assert_eq!(resp.app_hash, net.app.store().last_hash().to_vec());
        assert_eq!(resp.validators.len(), 1);
        assert_eq!(resp.validators[0].power, 1_200);

        // both chains continue identically
        let header = Header {
            chain_id: CHAIN_ID.into(),
            height: 6,
            time: net.time.add(BLOCK_TIME),
            proposer_address: net.proposer,
        };
        let votes = net.votes.clone();
        let mut hashes = Vec::new();
        for app in [&mut net.app, &mut imported] {
            app.begin_block(RequestBeginBlock {
                header: header.clone(),
                last_commit_info: LastCommitInfo {
                    round: 0,
                    votes: votes.clone(),
                },
                byzantine_validators: Vec::new(),
            })
            .unwrap();
            app.end_block(RequestEndBlock { height: 6 }).unwrap();
            hashes.push(app.commit().unwrap().data);
        }
        assert_eq!(hashes[0], hashes[1]);
    }

    #[test]
    fn test_commission_change_boundary() {
        let mut net = create_test_network(|_| {});
        let edit = |net: &Network, rate: Dec| -> Msg {
            MsgEditValidator {
                validator_address: net.actor("v1").operator(),
                description: None,
                commission_rate: Some(rate),
                min_self_delegation: None,
            }
            .into()
        };
        let too_soon = edit(&net, Dec::percent(11));
        let responses = net.block(vec![("v1", vec![too_soon])]);
        assert_eq!(responses[0].code, code_of(NmxError::CommissionUpdateTooSoon(String::new())));

        net.skip(Duration::from_secs(86_400));
        let over = edit(&net, Dec::percent(11) + Dec::from_raw(1));
        let exact = edit(&net, Dec::percent(11));
        let responses = net.block(vec![("v1", vec![over]), ("v1", vec![exact])]);
        assert_eq!(responses[0].code, code_of(NmxError::InvalidCommissionRate(String::new())));
        assert!(responses[1].is_ok(), "{}", responses[1].log);
        assert_eq!(net.validator("v1").commission.rates.rate, Dec::percent(11));
    }

    #[test]
    fn test_self_redelegation_rejected() {
        let mut net = create_test_network(|_| {});
        let operator = net.actor("v1").operator();
        let msg: Msg = MsgBeginRedelegate {
            delegator_address: net.actor("delegator").address(),
            validator_src_address: operator,
            validator_dst_address: operator,
            amount: unmx(1_000),
        }
        .into();
        let actor = net.actor("delegator");
        let tx = TxBuilder::new()
            .msg(msg)
            .sign(&actor.key, CHAIN_ID, actor.number, actor.sequence)
            .unwrap()
            .encode()
            .unwrap();
        let resp = net.app.check_tx(&tx, CheckTxType::New);
        assert_eq!(resp.code, code_of(NmxError::SelfRedelegation));

        // rejected by the ante stage, so the sequence is not consumed
        let responses = net.block_raw(vec![tx]);
        assert_eq!(responses[0].code, code_of(NmxError::SelfRedelegation));
        let msg = delegate_msg(&net, "delegator", "v1", 1_000);
        net.block_ok(vec![("delegator", vec![msg])]);
    }

    #[test]
    fn test_info_tracks_commits() {
        let mut net = create_test_network(|_| {});
        let info = net.app.info();
        assert_eq!(info.last_block_height, 0);
        net.advance(2);
        let info = net.app.info();
        assert_eq!(info.last_block_height, 2);
        assert_eq!(info.last_block_app_hash, net.app.store().last_hash().to_vec());
        assert_eq!(net.app.last_block_time(), net.time);
    }

    #[test]
    fn test_randomized_activity_keeps_invariants() {
        let mut rng = StdRng::seed_from_u64(0x6e6d78);
        let mut net = create_test_network(|_| {});
        let create = create_validator_msg(net.actor("v2"), "validator-two", SELF_BOND);
        net.block_ok(vec![("v2", vec![create.into()])]);

        let senders = ["delegator", "voter", "requester", "owner1", "owner2"];
        let validators = ["v1", "v2"];
        let mut failures = 0;
        for _ in 0..40 {
            net.votes = validators
                .iter()
                .map(|name| VoteInfo {
                    validator: VoteValidator {
                        address: net.actor(name).cons(),
                        power: 1_000,
                    },
                    signed_last_block: rng.gen_bool(0.8),
                })
                .collect();

            let mut txs = Vec::new();
            for _ in 0..rng.gen_range(0..5) {
                let from = senders[rng.gen_range(0..senders.len())];
                let target = validators[rng.gen_range(0..2)];
                let other = if target == "v1" { "v2" } else { "v1" };
                let msg: Msg = match rng.gen_range(0..4) {
                    0 => {
                        let to = senders[rng.gen_range(0..senders.len())];
                        MsgSend {
                            from_address: net.actor(from).address(),
                            to_address: net.actor(to).address(),
                            amount: Coins::single(BOND_DENOM, Int::new(rng.gen_range(1..10_000))),
                        }
                        .into()
                    }
                    1 => delegate_msg(&net, from, target, rng.gen_range(1..50_000)),
                    2 => undelegate_msg(&net, from, target, rng.gen_range(1..20_000)),
                    _ => MsgBeginRedelegate {
                        delegator_address: net.actor(from).address(),
                        validator_src_address: net.actor(target).operator(),
                        validator_dst_address: net.actor(other).operator(),
                        amount: unmx(rng.gen_range(1..20_000)),
                    }
                    .into(),
                };
                txs.push((from, vec![msg]));
            }
            failures += net.block(txs).iter().filter(|r| !r.is_ok()).count();
            net.app.check_invariants().unwrap();
        }
        assert!(failures > 0, "sweep never hit a failing message");
        assert_eq!(net.validator("v1").status, BondStatus::Bonded);
        assert_eq!(net.validator("v2").status, BondStatus::Bonded);
    }
}
