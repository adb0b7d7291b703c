// src/app/query.rs

//! `Query` routing over committed versions.
//!
//! Paths:
//! * `app/version`
//! * `store/<module>/key` with the raw key as data; optional proof
//! * `custom/<module>/<endpoint>` with JSON parameters as data

use super::App;
use crate::abci::{RequestQuery, ResponseQuery};
use crate::context::{BlockHeader, Context, ExecMode};
use crate::errors::{NmxError, Result};
use crate::store::{full_key, names, VersionedStore};
use nmx_crypto::ConsAddress;
use tracing::warn;

impl App {
    /// `Query`; failures are reported in the response, never returned
    pub fn query(&self, req: &RequestQuery) -> ResponseQuery {
        match self.route_query(req) {
            Ok(resp) => resp,
            Err(err) => {
                warn!("query {} at height {} failed: {}", req.path, req.height, err);
                ResponseQuery::error(&err)
            }
        }
    }

    fn route_query(&self, req: &RequestQuery) -> Result<ResponseQuery> {
        let snapshot = self
            .store
            .version(req.height)
            .ok_or_else(|| NmxError::NotFound(format!("height {} is not retained", req.height)))?;
        let height = snapshot.height;
        let parts: Vec<&str> = req.path.trim_start_matches('/').splitn(3, '/').collect();

        match parts.as_slice() {
            ["app", "version"] => Ok(ResponseQuery {
                value: env!("CARGO_PKG_VERSION").as_bytes().to_vec(),
                height,
                ..Default::default()
            }),
            ["store", module, "key"] => {
                let name = names::ALL
                    .iter()
                    .copied()
                    .find(|n| n == module)
                    .ok_or_else(|| NmxError::UnknownRequest(format!("unknown store {}", module)))?;
                let value = snapshot
                    .get(&full_key(name, &req.data))
                    .cloned()
                    .unwrap_or_default();
                let proof = if req.prove {
                    snapshot.prove(name, &req.data)
                } else {
                    None
                };
                Ok(ResponseQuery {
                    key: req.data.clone(),
                    value,
                    proof,
                    height,
                    ..Default::default()
                })
            }
            ["custom", module, endpoint] => {
                let header = BlockHeader {
                    chain_id: self.chain_id.clone(),
                    height,
                    time: self.last_block_time,
                    proposer: ConsAddress::new([0u8; 20]),
                };
                let mut view = VersionedStore::from_snapshot(snapshot);
                let mut ctx = Context::new(&mut view, header, ExecMode::Query);
                let value = self.manager.query(&mut ctx, module, endpoint, &req.data)?;
                Ok(ResponseQuery {
                    value,
                    height,
                    ..Default::default()
                })
            }
            _ => Err(NmxError::UnknownRequest(format!("unknown query path {}", req.path))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abci::{ConsensusParams, RequestInitChain};
    use crate::app::AppOptions;
    use crate::time::Timestamp;

    fn create_test_app() -> App {
        let mut app = App::new(AppOptions::default()).unwrap();
        app.init_chain(RequestInitChain {
            time: Timestamp::from_unix_secs(1_700_000_000),
            chain_id: "nmx-test".into(),
            consensus_params: ConsensusParams::default(),
            validators: Vec::new(),
            app_state_bytes: Vec::new(),
            initial_height: 1,
        })
        .unwrap();
        app
    }

    #[test]
    fn test_version_and_unknown_paths() {
        let app = create_test_app();
        let resp = app.query(&RequestQuery {
            path: "app/version".into(),
            ..Default::default()
        });
        assert_eq!(resp.code, 0);
        assert_eq!(resp.value, env!("CARGO_PKG_VERSION").as_bytes());

        for path in ["nope", "store/nope/key", "custom/nope/x", "custom/bank/nope"] {
            let resp = app.query(&RequestQuery {
                path: path.into(),
                ..Default::default()
            });
            assert_eq!(resp.code, NmxError::UnknownRequest(String::new()).code(), "{}", path);
        }
    }

    #[test]
    fn test_unretained_height() {
        let app = create_test_app();
        let resp = app.query(&RequestQuery {
            path: "app/version".into(),
            height: 40,
            ..Default::default()
        });
        assert_eq!(resp.code, NmxError::NotFound(String::new()).code());
    }
}
