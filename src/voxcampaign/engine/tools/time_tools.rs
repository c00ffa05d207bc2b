//! Current-time and timezone-conversion tools, restored from the original
//! deployment's `tools/timezone.py` (dropped by the distilled spec, but in
//! scope as ambient conversational tooling — callers regularly ask "what
//! time is it" or need a meeting time converted between timezones).

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

use super::{ParameterType, ToolHandler, ToolMetadata, ToolParameter};
use crate::error::{VoxError, VoxResult};

#[derive(Deserialize)]
struct CurrentTimeArgs {
    timezone: Option<String>,
}

/// Reports the current time, optionally converted into a named IANA
/// timezone (defaults to UTC).
#[derive(Default)]
pub struct CurrentTimeTool;

#[async_trait]
impl ToolHandler for CurrentTimeTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: "current_time".into(),
            description: "Returns the current date and time, optionally in a named IANA timezone.".into(),
            parameters: vec![ToolParameter {
                name: "timezone".into(),
                description: "IANA timezone name, e.g. 'America/New_York'. Defaults to UTC.".into(),
                parameter_type: ParameterType::String,
                required: false,
            }],
        }
    }

    async fn call(&self, arguments: serde_json::Value) -> VoxResult<serde_json::Value> {
        let args: CurrentTimeArgs = serde_json::from_value(arguments)?;
        let now = Utc::now();
        let (rendered, tz_name) = match args.timezone {
            Some(name) => {
                let tz: Tz = name
                    .parse()
                    .map_err(|_| VoxError::ToolFailed("current_time".into(), format!("unknown timezone '{name}'")))?;
                (now.with_timezone(&tz).to_rfc3339(), name)
            }
            None => (now.to_rfc3339(), "UTC".to_string()),
        };
        Ok(serde_json::json!({ "current_time": rendered, "timezone": tz_name }))
    }
}

#[derive(Deserialize)]
struct ConvertTimeArgs {
    time: String,
    from_timezone: String,
    to_timezone: String,
}

/// Converts an RFC 3339 timestamp between two named IANA timezones.
#[derive(Default)]
pub struct ConvertTimeTool;

#[async_trait]
impl ToolHandler for ConvertTimeTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: "convert_time".into(),
            description: "Converts a timestamp from one IANA timezone to another.".into(),
            parameters: vec![
                ToolParameter {
                    name: "time".into(),
                    description: "An RFC 3339 timestamp.".into(),
                    parameter_type: ParameterType::String,
                    required: true,
                },
                ToolParameter {
                    name: "from_timezone".into(),
                    description: "IANA timezone the input time is expressed in.".into(),
                    parameter_type: ParameterType::String,
                    required: true,
                },
                ToolParameter {
                    name: "to_timezone".into(),
                    description: "IANA timezone to convert into.".into(),
                    parameter_type: ParameterType::String,
                    required: true,
                },
            ],
        }
    }

    async fn call(&self, arguments: serde_json::Value) -> VoxResult<serde_json::Value> {
        let args: ConvertTimeArgs = serde_json::from_value(arguments)?;
        let from_tz: Tz = args
            .from_timezone
            .parse()
            .map_err(|_| VoxError::ToolFailed("convert_time".into(), format!("unknown timezone '{}'", args.from_timezone)))?;
        let to_tz: Tz = args
            .to_timezone
            .parse()
            .map_err(|_| VoxError::ToolFailed("convert_time".into(), format!("unknown timezone '{}'", args.to_timezone)))?;

        let naive = chrono::DateTime::parse_from_rfc3339(&args.time)
            .map_err(|e| VoxError::ToolFailed("convert_time".into(), e.to_string()))?
            .naive_utc();
        let in_from_tz = from_tz
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(|| VoxError::ToolFailed("convert_time".into(), "ambiguous or invalid local time".into()))?;
        let converted = in_from_tz.with_timezone(&to_tz);

        Ok(serde_json::json!({ "converted_time": converted.to_rfc3339() }))
    }
}
