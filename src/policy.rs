use crate::selector::Selector;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, SeqAccess, Visitor},
};
use std::fmt;

/// A NUC policy.
#[derive(Clone, Debug, PartialEq)]
pub enum Policy {
    Operator(OperatorPolicy),
    Connector(ConnectorPolicy),
}

impl Policy {
    /// Evaluate a policy on a token and an external context.
    #[must_use]
    pub fn evaluate(&self, token: &serde_json::Value, context: &serde_json::Value) -> bool {
        match self {
            Self::Operator(policy) => policy.evaluate(token, context),
            Self::Connector(policy) => policy.evaluate(token, context),
        }
    }
}

/// A policy that contains an operator.
#[derive(Clone, Debug, PartialEq)]
pub struct OperatorPolicy {
    /// The selector being used.
    pub selector: Selector,

    /// The operator to be applied to the selected value.
    pub operator: Operator,
}

impl OperatorPolicy {
    fn evaluate(&self, token: &serde_json::Value, context: &serde_json::Value) -> bool {
        // A selector miss yields no value, which equals nothing and differs from everything.
        let value = self.selector.apply(token, context);
        match &self.operator {
            Operator::Equals(expected) => value == Some(expected),
            Operator::NotEquals(expected) => value != Some(expected),
            Operator::AnyOf(options) => match value {
                Some(value) => options.iter().any(|option| value == option),
                None => false,
            },
        }
    }
}

impl From<OperatorPolicy> for Policy {
    fn from(operator: OperatorPolicy) -> Self {
        Self::Operator(operator)
    }
}

/// An operator.
#[derive(Clone, Debug, PartialEq)]
pub enum Operator {
    Equals(serde_json::Value),
    NotEquals(serde_json::Value),
    AnyOf(Vec<serde_json::Value>),
}

/// A policy that contains a connector.
///
/// `And`/`Or` must have at least one child; empty connectors are rejected when a
/// policy is parsed so evaluation never has to define a meaning for them.
#[derive(Clone, Debug, PartialEq)]
pub enum ConnectorPolicy {
    And(Vec<Policy>),
    Or(Vec<Policy>),
    Not(Box<Policy>),
}

impl ConnectorPolicy {
    fn evaluate(&self, token: &serde_json::Value, context: &serde_json::Value) -> bool {
        match self {
            ConnectorPolicy::And(conditions) => {
                !conditions.is_empty() && conditions.iter().all(|condition| condition.evaluate(token, context))
            }
            ConnectorPolicy::Or(conditions) => conditions.iter().any(|condition| condition.evaluate(token, context)),
            ConnectorPolicy::Not(policy) => !policy.evaluate(token, context),
        }
    }
}

impl From<ConnectorPolicy> for Policy {
    fn from(operator: ConnectorPolicy) -> Self {
        Self::Connector(operator)
    }
}

impl<'de> Deserialize<'de> for Policy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(PolicyVisitor)
    }
}

impl Serialize for Policy {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serialize::*;
        match &self {
            Policy::Operator(operator) => serialize_operator_policy(operator, serializer),
            Policy::Connector(connector) => serialize_connector_policy(connector, serializer),
        }
    }
}

struct PolicyVisitor;

impl<'de> Visitor<'de> for PolicyVisitor {
    type Value = Policy;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a valid policy array")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        use deserialize::*;
        let s = seq.next_element::<String>()?.ok_or_else(|| Error::invalid_length(0, &self))?;
        match s.as_str() {
            "==" | "!=" => deserialize_simple_operator(seq, s).map(Into::into),
            "anyOf" => deserialize_list_operator(seq, s).map(Policy::Operator),
            "and" | "or" => deserialize_list_connector(seq, s).map(Into::into),
            "not" => deserialize_simple_connector(seq, s).map(Into::into),
            _ => Err(Error::custom(format!("invalid policy operator '{s}'"))),
        }
    }
}

mod serialize {
    use super::{ConnectorPolicy, Operator, OperatorPolicy};
    use crate::selector::Selector;
    use serde::{Serialize, ser::SerializeSeq};

    pub(super) fn serialize_operator_policy<S>(policy: &OperatorPolicy, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match &policy.operator {
            Operator::Equals(value) => serialize_operator("==", &policy.selector, value, serializer),
            Operator::NotEquals(value) => serialize_operator("!=", &policy.selector, value, serializer),
            Operator::AnyOf(values) => serialize_operator("anyOf", &policy.selector, values, serializer),
        }
    }

    pub(super) fn serialize_connector_policy<S>(policy: &ConnectorPolicy, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match policy {
            ConnectorPolicy::And(policy) => serialize_connector("and", policy, serializer),
            ConnectorPolicy::Or(policy) => serialize_connector("or", policy, serializer),
            ConnectorPolicy::Not(policy) => serialize_connector("not", policy, serializer),
        }
    }

    fn serialize_operator<T, S>(op: &str, selector: &Selector, value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: Serialize,
    {
        let mut seq = serializer.serialize_seq(Some(3))?;
        seq.serialize_element(op)?;
        seq.serialize_element(selector)?;
        seq.serialize_element(value)?;
        seq.end()
    }

    fn serialize_connector<T, S>(op: &str, value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: Serialize,
    {
        let mut seq = serializer.serialize_seq(Some(2))?;
        seq.serialize_element(op)?;
        seq.serialize_element(value)?;
        seq.end()
    }
}

mod deserialize {
    use super::{ConnectorPolicy, Operator, OperatorPolicy, Policy};
    use crate::selector::{Selector, SelectorParseError};
    use serde::de::{Error, SeqAccess, Unexpected};

    pub(super) fn deserialize_simple_operator<'de, A>(mut seq: A, op: String) -> Result<OperatorPolicy, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let selector = deserialize_selector(&mut seq, 1)?;
        let value = seq.next_element::<serde_json::Value>()?.ok_or_else(|| Error::invalid_length(2, &"a value"))?;
        let operator = match op.as_str() {
            "==" => Operator::Equals(value),
            "!=" => Operator::NotEquals(value),
            _ => return Err(Error::custom("unhandled operator")),
        };
        Ok(OperatorPolicy { selector, operator })
    }

    pub(super) fn deserialize_list_operator<'de, A>(mut seq: A, op: String) -> Result<OperatorPolicy, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let selector = deserialize_selector(&mut seq, 1)?;
        let values = seq
            .next_element::<Vec<serde_json::Value>>()?
            .ok_or_else(|| Error::invalid_length(2, &"a list of values"))?;
        let operator = match op.as_str() {
            "anyOf" => Operator::AnyOf(values),
            _ => return Err(Error::custom("unhandled operator")),
        };
        Ok(OperatorPolicy { selector, operator })
    }

    pub(super) fn deserialize_simple_connector<'de, A>(
        mut seq: A,
        connector: String,
    ) -> Result<ConnectorPolicy, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let policy = seq.next_element::<Box<Policy>>()?.ok_or_else(|| Error::invalid_length(1, &"a policy"))?;
        let connector = match connector.as_str() {
            "not" => ConnectorPolicy::Not(policy),
            _ => return Err(Error::custom("unhandled operator")),
        };
        Ok(connector)
    }

    pub(super) fn deserialize_list_connector<'de, A>(mut seq: A, connector: String) -> Result<ConnectorPolicy, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let policies =
            seq.next_element::<Vec<Policy>>()?.ok_or_else(|| Error::invalid_length(1, &"a list of policies"))?;
        if policies.is_empty() {
            return Err(Error::custom(format!("'{connector}' requires at least one policy")));
        }
        let connector = match connector.as_str() {
            "and" => ConnectorPolicy::And(policies),
            "or" => ConnectorPolicy::Or(policies),
            _ => return Err(Error::custom("unhandled operator")),
        };
        Ok(connector)
    }

    fn deserialize_selector<'de, A>(seq: &mut A, encountered: usize) -> Result<Selector, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let selector = seq
            .next_element::<String>()?
            .ok_or_else(|| Error::invalid_length(encountered, &"an attribute selector"))?;
        selector.parse().map_err(|e: SelectorParseError| Error::invalid_value(Unexpected::Seq, &e.to_string().as_str()))
    }
}

#[cfg(test)]
pub(crate) mod op {
    use super::*;
    use serde_json::Value;

    pub(crate) fn eq(selector: &str, value: Value) -> Policy {
        OperatorPolicy { selector: selector.parse().expect("invalid selector"), operator: Operator::Equals(value) }
            .into()
    }

    pub(crate) fn ne(selector: &str, value: Value) -> Policy {
        OperatorPolicy { selector: selector.parse().expect("invalid selector"), operator: Operator::NotEquals(value) }
            .into()
    }

    pub(crate) fn any_of(selector: &str, values: &[Value]) -> Policy {
        OperatorPolicy {
            selector: selector.parse().expect("invalid selector"),
            operator: Operator::AnyOf(values.to_vec()),
        }
        .into()
    }

    pub(crate) fn and<I: Into<Vec<Policy>>>(policies: I) -> Policy {
        ConnectorPolicy::And(policies.into()).into()
    }

    pub(crate) fn or<I: Into<Vec<Policy>>>(policies: I) -> Policy {
        ConnectorPolicy::Or(policies.into()).into()
    }

    pub(crate) fn not(policy: Policy) -> Policy {
        ConnectorPolicy::Not(policy.into()).into()
    }
}
