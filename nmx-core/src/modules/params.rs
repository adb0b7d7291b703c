// src/modules/params.rs

//! Typed parameter subspaces.
//!
//! Each module declares its parameters as a struct implementing
//! [`ParamSet`] plus an enum with one variant per field. Fields are stored
//! individually under `params/<subspace>/<field>` so that a single value
//! can change without rewriting the set, and each field validates itself.

use crate::abci::ConsensusParams;
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::modules::AppModule;
use crate::store::names;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// One typed parameter value
pub trait ParamField: Serialize + DeserializeOwned + Clone {
    /// Field name inside the subspace
    fn name(&self) -> &'static str;

    /// Range check of this field alone
    fn validate(&self) -> Result<()>;
}

/// A module's full parameter set
pub trait ParamSet: Default + Clone {
    /// Subspace name, normally the module name
    const SUBSPACE: &'static str;

    /// Per-field enumeration
    type Field: ParamField;

    /// Every field of the set
    fn fields(&self) -> Vec<Self::Field>;

    /// Overwrites one field
    fn apply(&mut self, field: Self::Field);

    /// Validates every field, then cross-field rules
    fn validate(&self) -> Result<()> {
        for field in self.fields() {
            field.validate()?;
        }
        self.validate_set()
    }

    /// Rules spanning several fields
    fn validate_set(&self) -> Result<()> {
        Ok(())
    }
}

const CONSENSUS_KEY: &[u8] = b"baseapp/consensus";

fn field_key(subspace: &str, field: &str) -> Vec<u8> {
    format!("{}/{}", subspace, field).into_bytes()
}

/// Reads and writes parameter subspaces
#[derive(Debug, Clone, Copy, Default)]
pub struct ParamsKeeper;

impl ParamsKeeper {
    /// Loads a parameter set; fields never written keep their defaults
    pub fn get<P: ParamSet>(&self, ctx: &mut Context<'_>) -> Result<P> {
        let prefix = format!("{}/", P::SUBSPACE).into_bytes();
        let mut params = P::default();
        for field in ctx.kv(names::PARAMS).values::<P::Field>(&prefix)? {
            params.apply(field);
        }
        Ok(params)
    }

    /// Validates and stores every field of a set
    pub fn set<P: ParamSet>(&self, ctx: &mut Context<'_>, params: &P) -> Result<()> {
        params.validate()?;
        let mut store = ctx.kv(names::PARAMS);
        for field in params.fields() {
            store.set(&field_key(P::SUBSPACE, field.name()), &field)?;
        }
        Ok(())
    }

    /// Changes one field after validating it and the resulting set
    pub fn update<P: ParamSet>(&self, ctx: &mut Context<'_>, field: P::Field) -> Result<()> {
        field.validate()?;
        let mut params: P = self.get(ctx)?;
        params.apply(field.clone());
        params.validate_set()?;
        ctx.kv(names::PARAMS)
            .set(&field_key(P::SUBSPACE, field.name()), &field)
    }

    /// Consensus parameters in force
    pub fn consensus_params(&self, ctx: &mut Context<'_>) -> Result<ConsensusParams> {
        Ok(ctx
            .kv(names::PARAMS)
            .get(CONSENSUS_KEY)?
            .unwrap_or_default())
    }

    /// Stores consensus parameters
    pub fn set_consensus_params(&self, ctx: &mut Context<'_>, params: &ConsensusParams) -> Result<()> {
        if params.block.max_bytes == 0 {
            return Err(NmxError::InvalidParams("block max_bytes must be positive".into()));
        }
        if params.evidence.max_age_num_blocks == 0 {
            return Err(NmxError::InvalidParams(
                "evidence max_age_num_blocks must be positive".into(),
            ));
        }
        ctx.kv(names::PARAMS).set(CONSENSUS_KEY, params)
    }
}

/// Validates that a decimal lies in `[0, 1]`
pub fn validate_unit(name: &str, value: crate::math::Dec) -> Result<()> {
    if !value.is_unit() {
        return Err(NmxError::InvalidParams(format!(
            "{} must be within [0, 1]: {}",
            name, value
        )));
    }
    Ok(())
}

/// Validates that a count is non-zero
pub fn validate_positive(name: &str, value: u64) -> Result<()> {
    if value == 0 {
        return Err(NmxError::InvalidParams(format!("{} must be positive", name)));
    }
    Ok(())
}

/// Params module; its subtree is filled by the other modules
#[derive(Debug, Clone, Default)]
pub struct ParamsModule;

impl AppModule for ParamsModule {
    fn name(&self) -> &'static str {
        names::PARAMS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::*;
    use crate::context::ExecMode;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq)]
    struct TestParams {
        limit: u64,
        label: String,
    }

    impl Default for TestParams {
        fn default() -> Self {
            Self {
                limit: 10,
                label: "x".into(),
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum TestParam {
        Limit(u64),
        Label(String),
    }

    impl ParamField for TestParam {
        fn name(&self) -> &'static str {
            match self {
                TestParam::Limit(_) => "limit",
                TestParam::Label(_) => "label",
            }
        }

        fn validate(&self) -> Result<()> {
            match self {
                TestParam::Limit(v) => validate_positive("limit", *v),
                TestParam::Label(_) => Ok(()),
            }
        }
    }

    impl ParamSet for TestParams {
        const SUBSPACE: &'static str = "test";
        type Field = TestParam;

        fn fields(&self) -> Vec<TestParam> {
            vec![TestParam::Limit(self.limit), TestParam::Label(self.label.clone())]
        }

        fn apply(&mut self, field: TestParam) {
            match field {
                TestParam::Limit(v) => self.limit = v,
                TestParam::Label(v) => self.label = v,
            }
        }
    }

    #[test]
    fn test_defaults_when_unset() {
        let mut store = create_test_store();
        let mut ctx = Context::new(&mut store, create_test_header(1), ExecMode::Genesis);
        let params: TestParams = ParamsKeeper.get(&mut ctx).unwrap();
        assert_eq!(params, TestParams::default());
    }

    #[test]
    fn test_set_get_and_update() {
        let mut store = create_test_store();
        let mut ctx = Context::new(&mut store, create_test_header(1), ExecMode::Genesis);
        let params = TestParams {
            limit: 5,
            label: "y".into(),
        };
        ParamsKeeper.set(&mut ctx, &params).unwrap();
        assert_eq!(ParamsKeeper.get::<TestParams>(&mut ctx).unwrap(), params);

        ParamsKeeper
            .update::<TestParams>(&mut ctx, TestParam::Limit(7))
            .unwrap();
        assert_eq!(ParamsKeeper.get::<TestParams>(&mut ctx).unwrap().limit, 7);

        let err = ParamsKeeper
            .update::<TestParams>(&mut ctx, TestParam::Limit(0))
            .unwrap_err();
        assert!(matches!(err, NmxError::InvalidParams(_)));
    }

    #[test]
    fn test_consensus_params_roundtrip() {
        let mut store = create_test_store();
        let mut ctx = Context::new(&mut store, create_test_header(1), ExecMode::Genesis);
        let params = ConsensusParams::default();
        ParamsKeeper.set_consensus_params(&mut ctx, &params).unwrap();
        assert_eq!(ParamsKeeper.consensus_params(&mut ctx).unwrap(), params);
    }
}
