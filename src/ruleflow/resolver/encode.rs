//! `encode`: digests, bcrypt and base64

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use md5::{Digest, Md5};
use serde::Deserialize;
use serde_json::Value;
use sha1::Sha1;
use sha2::Sha256;

use super::{resolve_value, Runtime, Scope};
use crate::engine::error::{EngineError, Result};
use crate::ruleflow::ops::values::display;

const BCRYPT_COST: u32 = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct EncodeNode {
    #[serde(default)]
    pub input: Value,
    pub alg: String,
}

pub(super) async fn run(node: &EncodeNode, rt: &Runtime, scope: &Scope) -> Result<Value> {
    let input = display(&resolve_value(node.input.clone(), rt, scope).await?);
    encode(&node.alg, &input).map(Value::String)
}

fn encode(alg: &str, input: &str) -> Result<String> {
    match alg {
        "md5" => Ok(hex::encode(Md5::digest(input.as_bytes()))),
        "sha1" => Ok(hex::encode(Sha1::digest(input.as_bytes()))),
        "sha2" | "sha256" => Ok(hex::encode(Sha256::digest(input.as_bytes()))),
        "bcrypt" => bcrypt::hash(input, BCRYPT_COST)
            .map_err(|e| EngineError::node("encode", format!("bcrypt: {e}"))),
        "base64-en" => Ok(STANDARD.encode(input.as_bytes())),
        "base64-de" => {
            let bytes = STANDARD
                .decode(input.trim())
                .map_err(|e| EngineError::node("encode", format!("base64: {e}")))?;
            // Binary payloads come back as hex
            Ok(String::from_utf8(bytes).unwrap_or_else(|e| hex::encode(e.into_bytes())))
        }
        other => Err(EngineError::node(
            "encode",
            format!("unknown algorithm '{other}'"),
        )),
    }
}
