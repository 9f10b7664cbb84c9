use anyhow::anyhow;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Stage {
    #[default]
    Local,
    Development,
    Production,
}

impl Stage {
    pub fn as_str(&self) -> &str {
        match self {
            Stage::Local => "Local",
            Stage::Development => "Development",
            Stage::Production => "Production",
        }
    }
}

impl TryFrom<&String> for Stage {
    type Error = anyhow::Error;

    fn try_from(value: &String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "Local" => Ok(Stage::Local),
            "Development" => Ok(Stage::Development),
            "Production" => Ok(Stage::Production),
            _ => Err(anyhow!("Invalid stage: {}", value)),
        }
    }
}
