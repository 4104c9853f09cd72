use crate::{error::RegistrationError, msg::SchemaTag};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicBinding {
    name: String,
    schema: SchemaTag,
}

impl TopicBinding {
    pub fn new(name: &str, schema: SchemaTag) -> Result<Self, RegistrationError> {
        validate_name(name).map_err(|reason| RegistrationError::InvalidTopic {
            name: name.to_string(),
            reason,
        })?;

        Ok(Self {
            name: name.to_string(),
            schema,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> SchemaTag {
        self.schema
    }
}

/// Checks `name` against ROS graph resource naming rules.
pub fn validate_name(name: &str) -> Result<(), &'static str> {
    let Some(first) = name.chars().next() else {
        return Err("name is empty");
    };
    if first.is_ascii_digit() {
        return Err("name starts with a digit");
    }
    if name == "/" || name == "~" {
        return Err("name has no base name");
    }
    if name.ends_with('/') {
        return Err("name ends with '/'");
    }
    if name.contains("//") {
        return Err("name contains an empty segment");
    }
    if name.chars().skip(1).any(|c| c == '~') {
        return Err("'~' is only allowed as the first character");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '/' | '~'))
    {
        return Err("name contains characters outside [A-Za-z0-9_/~]");
    }
    // a segment such as "/1abc" is as invalid as a leading digit
    if name
        .split('/')
        .any(|seg| seg.chars().next().map_or(false, |c| c.is_ascii_digit()))
    {
        return Err("a name segment starts with a digit");
    }

    Ok(())
}
