// SPDX-License-Identifier: MIT

//! The closed set of node kinds
//!
//! A node travels as `{"resolveType": kind, "resolveData": {...}}` (or the
//! short `kind`/`data` keys). Decoding picks the variant for `kind` and
//! deserializes `data` into its payload; evaluation matches exhaustively
//! over the variants.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use super::api_call::ApiCallNode;
use super::cache::{CacheKeyNode, SetCacheNode};
use super::control::{CallRuleNode, ConditionalNode};
use super::date::{DateIntervalsNode, DateNode};
use super::dump::DbDumpNode;
use super::encode::EncodeNode;
use super::getters::{ConstNode, GetIterNode, GetStoreNode};
use super::iteration::{FilterMapNode, ForEachNode};
use super::misc::{ArithmeticNode, CastNode, InterpolationNode, JqNode, UuidNode};
use super::query::QueryNode;
use super::setters::{LogNode, SendResNode, SetNode};
use super::{api_call, cache, control, date, dump, encode, getters, iteration, misc, query, setters};
use super::{Runtime, Scope};
use crate::engine::error::{EngineError, Result};

#[derive(Debug, Clone)]
pub enum Node {
    Const(ConstNode),
    GetReq,
    GetHeaders,
    GetRes,
    GetStore(GetStoreNode),
    GetErrors,
    GetQueryRes,
    GetApiRes,
    GetIter(GetIterNode),
    Arithmetic(ArithmeticNode),
    Jq(JqNode),
    Query(QueryNode),
    ApiCall(ApiCallNode),
    SetRes(SetNode),
    SetStore(SetNode),
    Log(LogNode),
    SendRes(SendResNode),
    StringInterpolation(InterpolationNode),
    Encode(EncodeNode),
    SetCache(SetCacheNode),
    GetCache(CacheKeyNode),
    DeleteCache(CacheKeyNode),
    Uuid(UuidNode),
    Date(DateNode),
    DateIntervals(DateIntervalsNode),
    Cast(CastNode),
    Conditional(ConditionalNode),
    ForEach(Arc<ForEachNode>),
    FilterMap(Arc<FilterMapNode>),
    CallRule(CallRuleNode),
    DbDump(DbDumpNode),
}

fn payload<T: DeserializeOwned>(kind: &str, data: Value) -> Result<T> {
    serde_json::from_value(data).map_err(|source| EngineError::Decode {
        kind: kind.to_string(),
        source,
    })
}

impl Node {
    /// Build the node for `kind` from its `data` document
    pub fn decode(kind: &str, data: Value) -> Result<Node> {
        let data = if data.is_null() {
            Value::Object(Map::new())
        } else {
            data
        };

        let node = match kind {
            "const" => Node::Const(payload(kind, data)?),
            "getReq" => Node::GetReq,
            "getHeaders" => Node::GetHeaders,
            "getRes" => Node::GetRes,
            "getStore" => Node::GetStore(payload(kind, data)?),
            "getErrors" => Node::GetErrors,
            "getQueryRes" => Node::GetQueryRes,
            "getApiRes" => Node::GetApiRes,
            "getIter" => Node::GetIter(payload(kind, data)?),
            "arithmetic" => Node::Arithmetic(payload(kind, data)?),
            "jq" => Node::Jq(payload(kind, data)?),
            "db" => Node::Query(payload(kind, data)?),
            "api" => Node::ApiCall(payload(kind, data)?),
            "setRes" => Node::SetRes(payload(kind, data)?),
            "setStore" => Node::SetStore(payload(kind, data)?),
            "log" => Node::Log(payload(kind, data)?),
            "sendRes" => Node::SendRes(payload(kind, data)?),
            "stringInterpolation" => Node::StringInterpolation(payload(kind, data)?),
            "encode" => Node::Encode(payload(kind, data)?),
            "setCache" => Node::SetCache(payload(kind, data)?),
            "getCache" => Node::GetCache(payload(kind, data)?),
            "deleteCache" => Node::DeleteCache(payload(kind, data)?),
            "uuid" => Node::Uuid(payload(kind, data)?),
            "date" => Node::Date(payload(kind, data)?),
            "dateIntervals" => Node::DateIntervals(payload(kind, data)?),
            "cast" => Node::Cast(payload(kind, data)?),
            "conditional" => Node::Conditional(payload(kind, data)?),
            "forEach" => Node::ForEach(payload(kind, data)?),
            "filterMap" => Node::FilterMap(payload(kind, data)?),
            "callRule" => Node::CallRule(payload(kind, data)?),
            "dbDump" => Node::DbDump(payload(kind, data)?),
            other => return Err(EngineError::UnknownKind(other.to_string())),
        };
        Ok(node)
    }

    /// Wire name of the node kind
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Const(_) => "const",
            Node::GetReq => "getReq",
            Node::GetHeaders => "getHeaders",
            Node::GetRes => "getRes",
            Node::GetStore(_) => "getStore",
            Node::GetErrors => "getErrors",
            Node::GetQueryRes => "getQueryRes",
            Node::GetApiRes => "getApiRes",
            Node::GetIter(_) => "getIter",
            Node::Arithmetic(_) => "arithmetic",
            Node::Jq(_) => "jq",
            Node::Query(_) => "db",
            Node::ApiCall(_) => "api",
            Node::SetRes(_) => "setRes",
            Node::SetStore(_) => "setStore",
            Node::Log(_) => "log",
            Node::SendRes(_) => "sendRes",
            Node::StringInterpolation(_) => "stringInterpolation",
            Node::Encode(_) => "encode",
            Node::SetCache(_) => "setCache",
            Node::GetCache(_) => "getCache",
            Node::DeleteCache(_) => "deleteCache",
            Node::Uuid(_) => "uuid",
            Node::Date(_) => "date",
            Node::DateIntervals(_) => "dateIntervals",
            Node::Cast(_) => "cast",
            Node::Conditional(_) => "conditional",
            Node::ForEach(_) => "forEach",
            Node::FilterMap(_) => "filterMap",
            Node::CallRule(_) => "callRule",
            Node::DbDump(_) => "dbDump",
        }
    }

    /// Evaluate against the request context. Results are never memoized.
    pub fn evaluate<'a>(
        &'a self,
        rt: &'a Runtime,
        scope: &'a Scope,
    ) -> BoxFuture<'a, Result<Value>> {
        async move {
            if scope.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            log::debug!("[{}] evaluating {}", rt.tracer(), self.kind());

            match self {
                Node::Const(n) => Ok(n.value.clone()),
                Node::GetReq => Ok(rt.ctx.body().clone()),
                Node::GetHeaders => Ok(Value::Object(rt.ctx.headers().clone())),
                Node::GetRes => Ok(rt.ctx.response_snapshot().await),
                Node::GetStore(n) => getters::get_store(n, rt).await,
                Node::GetErrors => Ok(Value::Array(rt.ctx.user_errors().await)),
                Node::GetQueryRes => Ok(rt.ctx.query_log().await),
                Node::GetApiRes => Ok(rt.ctx.api_log().await),
                Node::GetIter(n) => getters::get_iter(n, scope),
                Node::Arithmetic(n) => misc::arithmetic(n, rt, scope).await,
                Node::Jq(n) => misc::jq(n, rt, scope).await,
                Node::Query(n) => query::run(n, rt, scope).await,
                Node::ApiCall(n) => api_call::run(n, rt, scope).await,
                Node::SetRes(n) => setters::set_response(n, rt, scope).await,
                Node::SetStore(n) => setters::set_store(n, rt, scope).await,
                Node::Log(n) => setters::log(n, rt, scope).await,
                Node::SendRes(n) => setters::send_response(n, rt, scope).await,
                Node::StringInterpolation(n) => misc::interpolate(n, rt, scope).await,
                Node::Encode(n) => encode::run(n, rt, scope).await,
                Node::SetCache(n) => cache::set(n, rt, scope).await,
                Node::GetCache(n) => cache::get(n, rt, scope).await,
                Node::DeleteCache(n) => cache::delete(n, rt, scope).await,
                Node::Uuid(n) => misc::uuid(n),
                Node::Date(n) => date::build(n, rt, scope).await,
                Node::DateIntervals(n) => date::intervals(n, rt, scope).await,
                Node::Cast(n) => misc::cast(n, rt, scope).await,
                Node::Conditional(n) => control::conditional(n, rt, scope).await,
                Node::ForEach(n) => iteration::for_each(n.clone(), rt, scope).await,
                Node::FilterMap(n) => iteration::filter_map(n.clone(), rt, scope).await,
                Node::CallRule(n) => control::call_rule(n, rt, scope).await,
                Node::DbDump(n) => dump::run(n, rt, scope).await,
            }
        }
        .boxed()
    }
}

#[derive(Deserialize)]
struct RawNode {
    #[serde(rename = "resolveType", alias = "kind")]
    kind: String,
    #[serde(rename = "resolveData", alias = "data", default)]
    data: Value,
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawNode::deserialize(deserializer)?;
        Node::decode(&raw.kind, raw.data).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ruleflow::resolver::testing::{eval, runtime};
    use serde_json::json;

    #[test]
    fn test_unknown_kind() {
        let err = Node::decode("teleport", json!({})).unwrap_err();
        assert!(matches!(err, EngineError::UnknownKind(ref k) if k == "teleport"));
    }

    #[test]
    fn test_decode_error_names_kind() {
        let err = Node::decode("getIter", json!({"index": "yes"})).unwrap_err();
        match err {
            EngineError::Decode { kind, .. } => assert_eq!(kind, "getIter"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(Node::decode("callRule", json!({})).is_err());
    }

    #[test]
    fn test_null_data_is_empty_payload() {
        let node = Node::decode("getReq", Value::Null).unwrap();
        assert_eq!(node.kind(), "getReq");
        let node = Node::decode("getStore", Value::Null).unwrap();
        assert!(matches!(node, Node::GetStore(ref n) if n.query.is_none()));
    }

    #[test]
    fn test_deserialize_accepts_both_key_styles() {
        let long: Node =
            serde_json::from_value(json!({"resolveType": "uuid", "resolveData": {"version": "v4"}}))
                .unwrap();
        let short: Node = serde_json::from_value(json!({"kind": "getRes", "data": {}})).unwrap();
        assert_eq!(long.kind(), "uuid");
        assert_eq!(short.kind(), "getRes");

        let bad = serde_json::from_value::<Node>(json!({"kind": "nope", "data": {}}));
        assert!(bad.unwrap_err().to_string().contains("unknown node kind"));
    }

    #[tokio::test]
    async fn test_const_returns_value_verbatim() {
        let rt = runtime();
        let out = eval(
            &rt,
            json!({"kind": "const", "data": {"value": {"kind": "getReq", "data": {}}}}),
        )
        .await
        .unwrap();
        assert_eq!(out, json!({"kind": "getReq", "data": {}}));
    }

    #[tokio::test]
    async fn test_no_memoization() {
        let rt = runtime();
        let node = Node::decode("uuid", json!({})).unwrap();
        let scope = Scope::default();
        let a = node.evaluate(&rt, &scope).await.unwrap();
        let b = node.evaluate(&rt, &scope).await.unwrap();
        assert_ne!(a, b);
    }
}
