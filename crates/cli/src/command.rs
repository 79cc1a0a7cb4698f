//! Command parsing and dispatch

use crate::CliError;
use data_validator::{flat_req_from_json, FlatReq, Validator};
use registry::{Registry, RegistryError};
use serde_json::{json, Value};
use tracing::debug;

/// A registry operation with its raw arguments
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    AddSensorType(FlatReq),
    AddSensor(FlatReq),
    AddSensorReading(FlatReq),
    FindSensorTypes(FlatReq),
    FindSensors(FlatReq),
    FindSensorReadings(FlatReq),
    Clear,
}

/// One input line
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Request(Request),
    Help,
    Quit,
}

impl Command {
    /// Parse a line; blank lines and `#` comments yield `None`
    pub fn parse(line: &str) -> Result<Option<Self>, CliError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        let command = match name {
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            "clear" => Command::Request(Request::Clear),
            "addSensorType" => Command::Request(Request::AddSensorType(parse_args(rest)?)),
            "addSensor" => Command::Request(Request::AddSensor(parse_args(rest)?)),
            "addSensorReading" => Command::Request(Request::AddSensorReading(parse_args(rest)?)),
            "findSensorTypes" => Command::Request(Request::FindSensorTypes(parse_args(rest)?)),
            "findSensors" => Command::Request(Request::FindSensors(parse_args(rest)?)),
            "findSensorReadings" => {
                Command::Request(Request::FindSensorReadings(parse_args(rest)?))
            }
            other => return Err(CliError::UnknownCommand(other.to_string())),
        };
        Ok(Some(command))
    }
}

/// Arguments are either one JSON object or whitespace-separated `name=value`
/// pairs
fn parse_args(rest: &str) -> Result<FlatReq, CliError> {
    if rest.starts_with('{') {
        let value: Value = serde_json::from_str(rest)
            .map_err(|e| CliError::BadArgument(format!("invalid JSON: {}", e)))?;
        return flat_req_from_json(&value).map_err(|e| CliError::Registry(e.into()));
    }

    rest.split_whitespace()
        .map(|pair| {
            pair.split_once('=')
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .ok_or_else(|| CliError::BadArgument(format!("expected name=value, got {}", pair)))
        })
        .collect()
}

/// Validate and run `request`, returning its JSON result
pub async fn execute(
    registry: &mut Registry,
    validator: &Validator,
    request: Request,
) -> Result<Value, RegistryError> {
    debug!("Executing {:?}", request);
    let value = match request {
        Request::AddSensorType(req) => {
            let sensor_type = registry.add_sensor_type(validator.sensor_type(&req)?).await?;
            json!(sensor_type)
        }
        Request::AddSensor(req) => {
            let sensor = registry.add_sensor(validator.sensor(&req)?).await?;
            json!(sensor)
        }
        Request::AddSensorReading(req) => {
            let sequence = registry
                .add_sensor_reading(validator.sensor_reading(&req)?)
                .await?;
            json!(sequence)
        }
        Request::FindSensorTypes(req) => {
            let found = registry
                .find_sensor_types(&validator.sensor_type_filter(&req)?)
                .await?;
            json!(found)
        }
        Request::FindSensors(req) => {
            let found = registry.find_sensors(&validator.sensor_filter(&req)?).await?;
            json!(found)
        }
        Request::FindSensorReadings(req) => {
            let found = registry
                .find_sensor_readings(&validator.reading_filter(&req)?)
                .await?;
            json!(found)
        }
        Request::Clear => {
            registry.clear().await?;
            json!([])
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use registry::ErrorKind;

    fn request(line: &str) -> Request {
        match Command::parse(line).unwrap() {
            Some(Command::Request(request)) => request,
            other => panic!("expected request, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_pairs() {
        let Request::AddSensor(req) = request("addSensor id=s1 sensorTypeId=t1 min=10 max=90")
        else {
            panic!("wrong request");
        };
        assert_eq!(req.get("sensorTypeId").map(String::as_str), Some("t1"));
        assert_eq!(req.get("max").map(String::as_str), Some("90"));
    }

    #[test]
    fn test_parse_json_argument() {
        let Request::AddSensorType(req) = request(
            r#"addSensorType {"id": "t1", "manufacturer": "Acme Labs", "limits": {"min": 0, "max": 5}}"#,
        ) else {
            panic!("wrong request");
        };
        assert_eq!(req.get("manufacturer").map(String::as_str), Some("Acme Labs"));
        assert_eq!(req.get("min").map(String::as_str), Some("0"));
    }

    #[test]
    fn test_parse_control_lines() {
        assert_eq!(Command::parse("   ").unwrap(), None);
        assert_eq!(Command::parse("# seed data").unwrap(), None);
        assert_eq!(Command::parse("help").unwrap(), Some(Command::Help));
        assert_eq!(Command::parse("quit").unwrap(), Some(Command::Quit));
        assert_eq!(request("clear"), Request::Clear);
        assert!(matches!(
            Command::parse("dropEverything"),
            Err(CliError::UnknownCommand(_))
        ));
        assert!(matches!(
            Command::parse("addSensor id"),
            Err(CliError::BadArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_execute_session() {
        let mut registry = Registry::transient();
        let validator = Validator::default();

        let lines = [
            "addSensorType id=t1 manufacturer=Acme modelNumber=A1 quantity=temperature min=0 max=100",
            "addSensor id=s1 sensorTypeId=t1 min=10 max=90",
            "addSensorReading sensorId=s1 timestamp=200 value=4.5",
            "addSensorReading sensorId=s1 timestamp=100 value=3",
        ];
        let mut last = Value::Null;
        for line in lines {
            last = execute(&mut registry, &validator, request(line)).await.unwrap();
        }
        assert_eq!(last.as_array().map(Vec::len), Some(2));
        assert_eq!(last[0]["timestamp"], 100);

        let found = execute(
            &mut registry,
            &validator,
            request("findSensorReadings sensorId=s1 minTimestamp=150"),
        )
        .await
        .unwrap();
        assert_eq!(found, json!([{"sensorId": "s1", "timestamp": 200, "value": 4.5}]));

        let types = execute(&mut registry, &validator, request("findSensorTypes manufacturer=Acme"))
            .await
            .unwrap();
        assert_eq!(types[0]["limits"], json!({"min": 0.0, "max": 100.0}));

        let cleared = execute(&mut registry, &validator, Request::Clear).await.unwrap();
        assert_eq!(cleared, json!([]));
    }

    #[tokio::test]
    async fn test_execute_reports_kind() {
        let mut registry = Registry::transient();
        let validator = Validator::default();

        let err = execute(&mut registry, &validator, request("addSensor id=s1 min=1 max=2"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Required);

        let err = execute(
            &mut registry,
            &validator,
            request("addSensor id=s1 sensorTypeId=t9 min=1 max=2"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.report().kind, ErrorKind::BadId);
    }
}
