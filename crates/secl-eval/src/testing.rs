//! In-memory model used by tests.
//!
//! Event types: `open` (`open.filename`, `open.flags`), `exec`
//! (`exec.file.path`, `exec.argc`), `unlink` (`unlink.filename`), plus the
//! `process.*` fields shared by all of them.

use crate::{EvalError, EventType, Event, FieldKind, FieldSpec, Model, Value};

pub struct TestModel;

impl Model for TestModel {
    fn field_spec(&self, field: &str) -> Result<FieldSpec, EvalError> {
        let spec = match field {
            "open.filename" => FieldSpec::new(FieldKind::String, "open"),
            "open.flags" => FieldSpec::new(FieldKind::Int, "open"),
            "exec.file.path" => FieldSpec::new(FieldKind::String, "exec"),
            "exec.argc" => FieldSpec::new(FieldKind::Int, "exec"),
            "unlink.filename" => FieldSpec::new(FieldKind::String, "unlink"),
            "process.name" => FieldSpec::common(FieldKind::String),
            "process.uid" | "process.gid" => FieldSpec::common(FieldKind::Int),
            "process.is_root" => FieldSpec::common(FieldKind::Bool),
            _ => return Err(EvalError::FieldNotFound(field.to_string())),
        };
        Ok(spec)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestEvent {
    pub event_type: EventType,
    pub filename: String,
    pub flags: i64,
    pub path: String,
    pub argc: i64,
    pub process_name: String,
    pub uid: i64,
    pub gid: i64,
    pub is_root: bool,
}

impl TestEvent {
    pub fn open(filename: &str, flags: i64) -> Self {
        Self {
            event_type: "open".to_string(),
            filename: filename.to_string(),
            flags,
            ..Default::default()
        }
    }

    pub fn exec(path: &str) -> Self {
        Self {
            event_type: "exec".to_string(),
            path: path.to_string(),
            ..Default::default()
        }
    }

    pub fn unlink(filename: &str) -> Self {
        Self {
            event_type: "unlink".to_string(),
            filename: filename.to_string(),
            ..Default::default()
        }
    }

    fn check_type(&self, field: &str) -> Result<(), EvalError> {
        match TestModel.field_spec(field)?.event_type {
            Some(event_type) if event_type != self.event_type => {
                Err(EvalError::FieldNotFound(field.to_string()))
            }
            _ => Ok(()),
        }
    }
}

impl Event for TestEvent {
    fn get_type(&self) -> &str {
        &self.event_type
    }

    fn get_field_event_type(&self, field: &str) -> Result<EventType, EvalError> {
        Ok(TestModel
            .field_spec(field)?
            .event_type
            .unwrap_or_else(|| self.event_type.clone()))
    }

    fn get_field_value(&self, field: &str) -> Result<Value, EvalError> {
        self.check_type(field)?;
        let value = match field {
            "open.filename" | "unlink.filename" => Value::String(self.filename.clone()),
            "open.flags" => Value::Int(self.flags),
            "exec.file.path" => Value::String(self.path.clone()),
            "exec.argc" => Value::Int(self.argc),
            "process.name" => Value::String(self.process_name.clone()),
            "process.uid" => Value::Int(self.uid),
            "process.gid" => Value::Int(self.gid),
            "process.is_root" => Value::Bool(self.is_root),
            _ => return Err(EvalError::FieldNotFound(field.to_string())),
        };
        Ok(value)
    }

    fn set_field_value(&mut self, field: &str, value: Value) -> Result<(), EvalError> {
        let spec = TestModel.field_spec(field)?;
        let mismatch = |value: &Value| EvalError::FieldValue {
            field: field.to_string(),
            reason: format!("expected {}, got {}", spec.kind, value.kind()),
        };

        match (field, value) {
            ("open.filename" | "unlink.filename", Value::String(s)) => self.filename = s,
            ("open.flags", Value::Int(i)) => self.flags = i,
            ("exec.file.path", Value::String(s)) => self.path = s,
            ("exec.argc", Value::Int(i)) => self.argc = i,
            ("process.name", Value::String(s)) => self.process_name = s,
            ("process.uid", Value::Int(i)) => self.uid = i,
            ("process.gid", Value::Int(i)) => self.gid = i,
            ("process.is_root", Value::Bool(b)) => self.is_root = b,
            (_, value) => return Err(mismatch(&value)),
        }

        if let Some(event_type) = spec.event_type {
            self.event_type = event_type;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_access_is_scoped_to_event_type() {
        let event = TestEvent::open("/etc/passwd", 2);
        assert_eq!(
            event.get_field_value("open.filename").unwrap(),
            Value::from("/etc/passwd")
        );
        assert!(event.get_field_value("exec.file.path").is_err());
        assert_eq!(event.get_field_event_type("process.uid").unwrap(), "open");
        assert_eq!(event.get_field_event_type("exec.file.path").unwrap(), "exec");
    }

    #[test]
    fn set_field_value() {
        let mut event = TestEvent::default();
        event.set_field_value("exec.file.path", Value::from("/bin/sh")).unwrap();
        assert_eq!(event.get_type(), "exec");
        assert_eq!(event.path, "/bin/sh");
        assert!(matches!(
            event.set_field_value("exec.argc", Value::from("3")),
            Err(EvalError::FieldValue { .. })
        ));
    }
}
