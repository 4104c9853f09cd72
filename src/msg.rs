use anyhow::bail;
use std::{fmt, str::FromStr};

/// Message type carried by a topic, named after its ROS type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaTag {
    StdString,
    StdEmpty,
}

impl SchemaTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StdString => "std_msgs/String",
            Self::StdEmpty => "std_msgs/Empty",
        }
    }
}

impl fmt::Display for SchemaTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaTag {
    type Err = anyhow::Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Ok(match text {
            "std_msgs/String" => Self::StdString,
            "std_msgs/Empty" => Self::StdEmpty,
            _ => bail!("Unsupported message type '{}'", text),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StringMsg {
    pub data: String,
}

impl StringMsg {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    String(StringMsg),
    Empty,
}

impl Message {
    pub fn schema(&self) -> SchemaTag {
        match self {
            Message::String(_) => SchemaTag::StdString,
            Message::Empty => SchemaTag::StdEmpty,
        }
    }
}

impl From<StringMsg> for Message {
    fn from(v: StringMsg) -> Self {
        Self::String(v)
    }
}
