//! Balance response validation
//!
//! [`parse`] is a pure function from a [`RawPayload`] to a [`ParseOutcome`].
//! Logging of the classification is left to the caller.

use serde_json::Value;
use thiserror::Error;

use crate::models::{BalanceReading, RawPayload};

/// Status code the service uses for a successful query
pub const SUCCESS_CODE: &str = "200";

/// Message substrings (matched case-insensitively) that mean the session cookie expired
pub const CREDENTIAL_KEYWORDS: [&str; 4] = ["login", "session", "token", "登录"];

const DEFAULT_MESSAGE: &str = "unknown error";

/// Why a payload did not yield a reading
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    /// The service reported a non-success status
    #[error("service returned status {code}: {message}")]
    BusinessError {
        /// Reported status code
        code: String,
        /// Reported message
        message: String,
    },

    /// The service rejected the session cookie
    #[error("session credential expired (status {code}): {message}")]
    CredentialExpired {
        /// Reported status code
        code: String,
        /// Reported message
        message: String,
    },

    /// The nested result object is absent or empty
    #[error("response has no resultObject")]
    MissingPayload,

    /// A result field is missing or not numeric
    #[error("field `{0}` could not be read as a number")]
    FieldCoercionError(&'static str),
}

impl ParseErrorKind {
    /// Whether operator intervention is needed (the cookie must be refreshed)
    pub fn is_credential_expired(&self) -> bool {
        matches!(self, Self::CredentialExpired { .. })
    }
}

/// Result of parsing one payload
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// A validated reading
    Success(BalanceReading),
    /// The payload was rejected
    Failure(ParseErrorKind),
}

impl ParseOutcome {
    /// Convert into a standard `Result`
    pub fn into_result(self) -> Result<BalanceReading, ParseErrorKind> {
        match self {
            Self::Success(reading) => Ok(reading),
            Self::Failure(kind) => Err(kind),
        }
    }
}

impl From<Result<BalanceReading, ParseErrorKind>> for ParseOutcome {
    fn from(result: Result<BalanceReading, ParseErrorKind>) -> Self {
        match result {
            Ok(reading) => Self::Success(reading),
            Err(kind) => Self::Failure(kind),
        }
    }
}

/// Validate a raw payload and extract the balance reading
pub fn parse(raw: &RawPayload) -> ParseOutcome {
    try_parse(raw.value()).into()
}

fn try_parse(value: &Value) -> Result<BalanceReading, ParseErrorKind> {
    check_status(value)?;

    let result = value
        .get("resultObject")
        .and_then(Value::as_object)
        .filter(|obj| !obj.is_empty())
        .ok_or(ParseErrorKind::MissingPayload)?;

    let balance = required_f64(result.get("leftEle"), "leftEle")?;
    if balance < 0.0 {
        return Err(ParseErrorKind::FieldCoercionError("leftEle"));
    }
    let credit = required_f64(result.get("leftMoney"), "leftMoney")?;
    let unit_price = required_f64(result.get("elePrice"), "elePrice")?;
    let timestamp_ms = required_i64(result.get("monTime"), "monTime")?;
    let free_units = match result.get("leftFreeEle") {
        None | Some(Value::Null) => 0.0,
        field => required_f64(field, "leftFreeEle")?,
    };

    Ok(BalanceReading::new(
        balance,
        credit,
        unit_price,
        free_units,
        timestamp_ms,
    ))
}

fn check_status(value: &Value) -> Result<(), ParseErrorKind> {
    let code = match value.get("statusCode") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "<missing>".to_string(),
    };
    if code == SUCCESS_CODE {
        return Ok(());
    }

    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_MESSAGE)
        .to_string();

    if mentions_credentials(&message) {
        Err(ParseErrorKind::CredentialExpired { code, message })
    } else {
        Err(ParseErrorKind::BusinessError { code, message })
    }
}

/// Whether a service message points at an expired session
pub fn mentions_credentials(message: &str) -> bool {
    let lowered = message.to_lowercase();
    CREDENTIAL_KEYWORDS.iter().any(|k| lowered.contains(k))
}

fn required_f64(field: Option<&Value>, name: &'static str) -> Result<f64, ParseErrorKind> {
    let number = match field {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number
        .filter(|n| n.is_finite())
        .ok_or(ParseErrorKind::FieldCoercionError(name))
}

fn required_i64(field: Option<&Value>, name: &'static str) -> Result<i64, ParseErrorKind> {
    let number = match field {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    };
    number.ok_or(ParseErrorKind::FieldCoercionError(name))
}

#[allow(clippy::cast_possible_truncation)]
fn integral(value: f64) -> Option<i64> {
    // bounds are exclusive of 2^63 so the cast cannot saturate
    (value.is_finite() && value.fract() == 0.0 && value.abs() < 9.2e18).then(|| value as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;
    use serde_json::json;

    fn raw(value: Value) -> RawPayload {
        RawPayload::new(value)
    }

    fn with_result(result: Value) -> RawPayload {
        raw(json!({"statusCode": "200", "message": "ok", "resultObject": result}))
    }

    #[test]
    fn test_low_balance_payload() {
        let payload = RawPayload::from_json(
            r#"{"statusCode":"200","resultObject":{"leftEle":15.5,"leftMoney":30,"elePrice":0.6,"monTime":1700000000000,"leftFreeEle":0}}"#,
        )
        .unwrap();

        let reading = parse(&payload).into_result().unwrap();
        assert_eq!(reading.balance(), 15.5);
        assert_eq!(reading.credit(), 30.0);
        assert_eq!(reading.unit_price(), 0.6);
        assert_eq!(reading.free_units(), 0.0);
        assert_eq!(reading.timestamp_ms(), 1_700_000_000_000);
        assert!(reading.is_below(20.0));
    }

    #[test]
    fn test_expired_session() {
        let payload = raw(json!({"statusCode": "401", "message": "session expired, please login"}));

        let outcome = parse(&payload);
        assert_eq!(
            outcome,
            ParseOutcome::Failure(ParseErrorKind::CredentialExpired {
                code: "401".to_string(),
                message: "session expired, please login".to_string(),
            })
        );
    }

    #[rstest]
    #[case("Session timeout")]
    #[case("TOKEN invalid")]
    #[case("Please Login again")]
    #[case("请重新登录")]
    fn test_credential_keywords(#[case] message: &str) {
        let payload = raw(json!({"statusCode": "500", "message": message}));
        let err = parse(&payload).into_result().unwrap_err();
        assert!(err.is_credential_expired(), "{message}: {err:?}");
    }

    #[test]
    fn test_business_error_defaults_message() {
        let payload = raw(json!({"statusCode": "500"}));
        assert_eq!(
            parse(&payload).into_result().unwrap_err(),
            ParseErrorKind::BusinessError {
                code: "500".to_string(),
                message: "unknown error".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_status_is_business_error() {
        let payload = raw(json!({"resultObject": {"leftEle": 1}}));
        assert!(matches!(
            parse(&payload).into_result(),
            Err(ParseErrorKind::BusinessError { .. })
        ));
    }

    #[test]
    fn test_numeric_status_code_accepted() {
        let payload = raw(json!({
            "statusCode": 200,
            "resultObject": {"leftEle": 40, "leftMoney": 24, "elePrice": 0.6, "monTime": 1}
        }));
        let reading = parse(&payload).into_result().unwrap();
        assert_eq!(reading.balance(), 40.0);
    }

    #[rstest]
    #[case(json!({"statusCode": "200"}))]
    #[case(json!({"statusCode": "200", "resultObject": null}))]
    #[case(json!({"statusCode": "200", "resultObject": {}}))]
    #[case(json!({"statusCode": "200", "resultObject": [1, 2]}))]
    fn test_missing_payload(#[case] value: Value) {
        assert_eq!(
            parse(&raw(value)),
            ParseOutcome::Failure(ParseErrorKind::MissingPayload)
        );
    }

    #[rstest]
    #[case(json!({"leftMoney": 1, "elePrice": 1, "monTime": 1}), "leftEle")]
    #[case(json!({"leftEle": "abc", "leftMoney": 1, "elePrice": 1, "monTime": 1}), "leftEle")]
    #[case(json!({"leftEle": -0.5, "leftMoney": 1, "elePrice": 1, "monTime": 1}), "leftEle")]
    #[case(json!({"leftEle": 1, "leftMoney": null, "elePrice": 1, "monTime": 1}), "leftMoney")]
    #[case(json!({"leftEle": 1, "leftMoney": 1, "elePrice": true, "monTime": 1}), "elePrice")]
    #[case(json!({"leftEle": 1, "leftMoney": 1, "elePrice": 1, "monTime": 1.5}), "monTime")]
    #[case(json!({"leftEle": 1, "leftMoney": 1, "elePrice": 1, "monTime": "soon"}), "monTime")]
    #[case(json!({"leftEle": 1, "leftMoney": 1, "elePrice": 1, "monTime": 1, "leftFreeEle": "x"}), "leftFreeEle")]
    fn test_field_coercion_errors(#[case] result: Value, #[case] field: &'static str) {
        assert_eq!(
            parse(&with_result(result)).into_result().unwrap_err(),
            ParseErrorKind::FieldCoercionError(field)
        );
    }

    #[test]
    fn test_numeric_strings_are_coerced() {
        let payload = with_result(json!({
            "leftEle": " 12.25 ",
            "leftMoney": "7.35",
            "elePrice": "0.6",
            "monTime": "1700000000000",
        }));
        let reading = parse(&payload).into_result().unwrap();
        assert_eq!(reading.balance(), 12.25);
        assert_eq!(reading.timestamp_ms(), 1_700_000_000_000);
        assert_eq!(reading.free_units(), 0.0);
    }

    #[test]
    fn test_integral_float_timestamp() {
        let payload = with_result(json!({
            "leftEle": 1, "leftMoney": 1, "elePrice": 1, "monTime": 1.7e12,
        }));
        assert_eq!(
            parse(&payload).into_result().unwrap().timestamp_ms(),
            1_700_000_000_000
        );
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            (-1.0e6f64..1.0e6).prop_map(Value::from),
            "[a-z0-9 .]{0,12}".prop_map(Value::from),
            Just(Value::from("200")),
        ];
        leaf.prop_recursive(3, 24, 6, |inner| {
            prop::collection::btree_map(
                prop_oneof![
                    Just("statusCode".to_string()),
                    Just("message".to_string()),
                    Just("resultObject".to_string()),
                    Just("leftEle".to_string()),
                    Just("leftMoney".to_string()),
                    Just("elePrice".to_string()),
                    Just("monTime".to_string()),
                    "[a-z]{1,6}",
                ],
                inner,
                0..6,
            )
            .prop_map(|m| Value::Object(m.into_iter().collect()))
        })
    }

    proptest! {
        #[test]
        fn prop_parse_is_deterministic(value in arb_json()) {
            let payload = RawPayload::new(value);
            let before = payload.clone();
            let first = parse(&payload);
            let second = parse(&payload);
            prop_assert_eq!(first, second);
            prop_assert_eq!(payload, before);
        }
    }
}
