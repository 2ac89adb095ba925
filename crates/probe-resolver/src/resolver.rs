//! Field resolver: eight short-circuiting tiers from label to selector

use crate::tiers::{
    candidates, first_match, mapped_value, mapping_for, selectors_for, FieldQuery, TierInput,
    ATTRIBUTE_TIERS, LEXICAL_TIERS,
};
use async_trait::async_trait;
use probe_core::config::ResolverConfig;
use probe_core::fail_open::fail_open;
use probe_core::{DomSnapshot, FieldKind, FieldMapping, Result, Tier};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Semantic value mapping supplied by a language-model collaborator
#[async_trait]
pub trait ValueMapper: Send + Sync {
    /// Most probable technical value for a human label, if any
    async fn map_value(
        &self,
        label: &str,
        kind: FieldKind,
        name: &str,
        candidates: &[String],
    ) -> Result<Option<String>>;
}

/// A resolved field: the winning mapping and every selector for it, best first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub mapping: FieldMapping,
    pub selectors: Vec<String>,
}

pub struct FieldResolver {
    config: ResolverConfig,
    mapper: Option<Arc<dyn ValueMapper>>,
}

impl FieldResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            mapper: None,
        }
    }

    /// Enable the semantic tier
    pub fn with_mapper(mut self, mapper: Arc<dyn ValueMapper>) -> Self {
        self.mapper = Some(mapper);
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve `query` against `page`. `None` when every tier misses.
    #[instrument(skip(self, page), fields(kind = %query.kind, name = %query.name, label = %query.label))]
    pub async fn resolve(&self, page: &DomSnapshot, query: &FieldQuery) -> Option<Resolution> {
        let input = TierInput {
            page,
            query,
            candidates: candidates(page, query),
            config: &self.config,
        };
        if input.candidates.is_empty() {
            debug!("No candidates of this kind on the page");
            return None;
        }

        let hit = match first_match(&input, LEXICAL_TIERS) {
            Some(hit) => Some(hit),
            None => match self.semantic(&input).await {
                Some(hit) => Some(hit),
                None => first_match(&input, ATTRIBUTE_TIERS),
            },
        };
        self.finish(&input, hit)
    }

    /// All tiers except the semantic one; no collaborator is consulted
    pub fn resolve_lexical(&self, page: &DomSnapshot, query: &FieldQuery) -> Option<Resolution> {
        let input = TierInput {
            page,
            query,
            candidates: candidates(page, query),
            config: &self.config,
        };
        let hit = first_match(&input, LEXICAL_TIERS).or_else(|| first_match(&input, ATTRIBUTE_TIERS));
        self.finish(&input, hit)
    }

    /// Selectors only; empty when unresolved
    pub async fn resolve_selectors(&self, page: &DomSnapshot, query: &FieldQuery) -> Vec<String> {
        self.resolve(page, query)
            .await
            .map(|r| r.selectors)
            .unwrap_or_default()
    }

    async fn semantic(&self, input: &TierInput<'_>) -> Option<(Tier, usize)> {
        let mapper = self.mapper.as_ref()?;
        let values: Vec<String> = input.candidates.iter().map(|c| c.value.clone()).collect();
        let query = input.query;
        let mapped = fail_open("map_value", || {
            mapper.map_value(&query.label, query.kind, &query.name, &values)
        })
        .await
        .flatten()?;
        debug!(mapped = %mapped, "Semantic mapping suggested a value");
        mapped_value(input, &mapped).map(|idx| (Tier::Semantic, idx))
    }

    fn finish(&self, input: &TierInput<'_>, hit: Option<(Tier, usize)>) -> Option<Resolution> {
        let Some((tier, idx)) = hit else {
            debug!("All tiers exhausted");
            return None;
        };
        let candidate = input.candidates.get(idx)?;
        let selectors = selectors_for(input.page, input.query.kind, candidate);
        let primary = selectors.first().cloned().unwrap_or_default();
        debug!(%tier, selector = %primary, "Resolved field");
        Some(Resolution {
            mapping: mapping_for(candidate, primary, tier),
            selectors,
        })
    }
}

impl Default for FieldResolver {
    fn default() -> Self {
        Self::new(ResolverConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_core::{DomElement, ProbeError};

    fn interests(with_labels: bool) -> DomSnapshot {
        let mut elements = vec![DomElement::new(0, "form")];
        for (i, (value, text)) in [("tech", "Technology"), ("travel", "Travel"), ("sports", "Sports")]
            .iter()
            .enumerate()
        {
            let mut input = DomElement::new(1 + i * 2, "input");
            input.input_type = Some("checkbox".to_string());
            input.name = Some("interests".to_string());
            input.value = Some(value.to_string());
            input.parent = Some(0);
            elements.push(input);
            let mut br = DomElement::new(2 + i * 2, "br");
            br.parent = Some(0);
            if with_labels {
                br.tag = "span".to_string();
                br.text = text.to_string();
            }
            elements.push(br);
        }
        DomSnapshot {
            elements,
            ..DomSnapshot::default()
        }
    }

    struct FixedMapper(Option<&'static str>);

    #[async_trait]
    impl ValueMapper for FixedMapper {
        async fn map_value(&self, _: &str, _: FieldKind, _: &str, _: &[String]) -> Result<Option<String>> {
            Ok(self.0.map(String::from))
        }
    }

    struct FailingMapper;

    #[async_trait]
    impl ValueMapper for FailingMapper {
        async fn map_value(&self, _: &str, _: FieldKind, _: &str, _: &[String]) -> Result<Option<String>> {
            Err(ProbeError::Api("unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_interests_resolve_by_partial_tier() {
        let page = interests(false);
        let query = FieldQuery::new(FieldKind::Checkbox, "interests", "Technology");
        let resolution = FieldResolver::default().resolve(&page, &query).await.unwrap();
        assert_eq!(resolution.mapping.tier, Tier::Partial);
        assert_eq!(resolution.mapping.raw_value, "tech");
        assert_eq!(
            resolution.selectors[0],
            r#"input[type="checkbox"][name="interests"][value="tech"]"#
        );
    }

    #[tokio::test]
    async fn test_label_text_wins_when_labels_exist() {
        let page = interests(true);
        let query = FieldQuery::new(FieldKind::Checkbox, "interests", "travel");
        // exact value beats everything
        let r = FieldResolver::default().resolve(&page, &query).await.unwrap();
        assert_eq!(r.mapping.tier, Tier::ExactValue);

        let query = FieldQuery::new(FieldKind::Checkbox, "interests", "Technology");
        let r = FieldResolver::default().resolve(&page, &query).await.unwrap();
        assert_eq!(r.mapping.tier, Tier::LabelText);
        assert_eq!(r.mapping.recovered_label.as_deref(), Some("Technology"));
    }

    #[tokio::test]
    async fn test_exact_value_beats_better_fuzzy_label_elsewhere() {
        let mut page = interests(true);
        // the "sports" checkbox is captioned "Travel" exactly
        page.elements[6].text = "travel".to_string();
        let query = FieldQuery::new(FieldKind::Checkbox, "interests", "travel");
        let r = FieldResolver::default().resolve(&page, &query).await.unwrap();
        assert_eq!(r.mapping.tier, Tier::ExactValue);
        assert_eq!(r.mapping.raw_value, "travel");
    }

    #[tokio::test]
    async fn test_semantic_tier_requires_existing_different_value() {
        let page = interests(false);
        let query = FieldQuery::new(FieldKind::Checkbox, "interests", "Athletics");

        let none = FieldResolver::default().resolve(&page, &query).await;
        assert!(none.is_none());

        let mapped = FieldResolver::default()
            .with_mapper(Arc::new(FixedMapper(Some("sports"))))
            .resolve(&page, &query)
            .await
            .unwrap();
        assert_eq!(mapped.mapping.tier, Tier::Semantic);
        assert_eq!(mapped.mapping.raw_value, "sports");

        let unknown = FieldResolver::default()
            .with_mapper(Arc::new(FixedMapper(Some("golf"))))
            .resolve(&page, &query)
            .await;
        assert!(unknown.is_none());

        let failing = FieldResolver::default()
            .with_mapper(Arc::new(FailingMapper))
            .resolve(&page, &query)
            .await;
        assert!(failing.is_none());
    }

    #[tokio::test]
    async fn test_no_candidates_is_empty() {
        let page = interests(false);
        let query = FieldQuery::new(FieldKind::Radio, "interests", "tech");
        let resolver = FieldResolver::default();
        assert!(resolver.resolve_selectors(&page, &query).await.is_empty());
        assert!(resolver.resolve_lexical(&page, &query).is_none());
    }

    #[test]
    fn test_generic_fields_match_by_name() {
        let mut page = DomSnapshot::default();
        page.elements.push(DomElement::new(0, "form"));
        let mut first = DomElement::new(1, "input");
        first.name = Some("firstName".to_string());
        first.parent = Some(0);
        page.elements.push(first);
        let query = FieldQuery::generic("first name");
        let r = FieldResolver::default().resolve_lexical(&page, &query).unwrap();
        assert_eq!(r.mapping.tier, Tier::NormalizedValue);
        assert_eq!(r.selectors[0], r#"input[name="firstName"]"#);
    }
}
