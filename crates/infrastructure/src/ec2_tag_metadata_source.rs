use async_trait::async_trait;
use runtally_application::EntityMetadataSource;
use runtally_core::{AppError, AppResult};
use runtally_domain::{AssociationIndex, EntityMetadata, MetadataSnapshot};
use serde_json::Value;
use tracing::debug;

use crate::aws_cli_runner::AwsCliRunner;
use crate::json_fields::{array_field, str_field};

/// EC2 instance tags and SSM associations read through the `aws` CLI.
#[derive(Debug, Clone)]
pub struct Ec2TagMetadataSource {
    aws_cli: AwsCliRunner,
}

impl Ec2TagMetadataSource {
    /// Creates a metadata source.
    #[must_use]
    pub fn new(aws_cli: AwsCliRunner) -> Self {
        Self { aws_cli }
    }
}

#[async_trait]
impl EntityMetadataSource for Ec2TagMetadataSource {
    async fn load_snapshot(&self) -> AppResult<MetadataSnapshot> {
        let tags = self
            .aws_cli
            .run_json(&[
                "ec2",
                "describe-tags",
                "--filters",
                "Name=resource-type,Values=instance",
            ])
            .await?;
        let entities = parse_instance_tags(&tags)?;

        let associations = self
            .aws_cli
            .run_json(&["ssm", "list-associations"])
            .await?;
        let associations = parse_associations(&associations)?;

        debug!(
            instances = entities.len(),
            associations = associations.len(),
            "loaded ec2 instance tags and ssm associations"
        );

        Ok(MetadataSnapshot::tracked(entities, associations))
    }
}

/// Groups a `describe-tags` body by instance id.
pub(crate) fn parse_instance_tags(body: &Value) -> AppResult<EntityMetadata> {
    let tags = array_field(body, "Tags").ok_or_else(|| {
        AppError::Transport("describe-tags response is missing 'Tags'".to_owned())
    })?;

    let mut entities = EntityMetadata::new();
    for tag in tags {
        let (Some(instance_id), Some(key)) = (str_field(tag, "ResourceId"), str_field(tag, "Key"))
        else {
            continue;
        };
        let value = tag.get("Value").and_then(Value::as_str).unwrap_or_default();
        entities.insert_tag(instance_id, key, value);
    }

    Ok(entities)
}

/// Collects association ids from a `list-associations` body.
pub(crate) fn parse_associations(body: &Value) -> AppResult<AssociationIndex> {
    let associations = array_field(body, "Associations").ok_or_else(|| {
        AppError::Transport("list-associations response is missing 'Associations'".to_owned())
    })?;

    Ok(associations
        .iter()
        .filter_map(|association| str_field(association, "AssociationId"))
        .collect())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{parse_associations, parse_instance_tags};

    #[test]
    fn tags_group_by_instance() {
        let body = json!({
            "Tags": [
                {"ResourceId": "i-0abc", "ResourceType": "instance", "Key": "os-type", "Value": "Linux"},
                {"ResourceId": "i-0abc", "ResourceType": "instance", "Key": "server-type", "Value": "onr-web"},
                {"ResourceId": "i-0def", "ResourceType": "instance", "Key": "os-type", "Value": "Windows"},
                {"ResourceType": "instance", "Key": "orphan", "Value": "x"}
            ]
        });

        let entities = parse_instance_tags(&body).unwrap_or_default();
        assert_eq!(entities.len(), 2);
        let tags = entities.tags_for("i-0abc");
        assert_eq!(tags.and_then(|tags| tags.get("server-type")), Some("onr-web"));
        assert_eq!(tags.map(|tags| tags.len()), Some(2));
    }

    #[test]
    fn associations_collect_ids() {
        let body = json!({
            "Associations": [
                {"AssociationId": "assoc-1", "Name": "AWS-UpdateSSMAgent"},
                {"AssociationId": "assoc-2", "Name": "AWS-RunPatchBaseline"}
            ]
        });

        let associations = parse_associations(&body).unwrap_or_default();
        assert!(associations.contains("assoc-1"));
        assert_eq!(associations.len(), 2);
    }

    #[test]
    fn missing_top_level_fields_are_transport_errors() {
        assert!(parse_instance_tags(&json!({})).is_err());
        assert!(parse_associations(&json!({"Tags": []})).is_err());
    }
}
