//! Reusable caption/message templates for the social channels.
//!
//! Templates contain `{{variable}}` placeholders that are substituted at render
//! time. Rendering counts as a use; listings are ordered by usage.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_CAPTION_LEN: usize = 2200;
pub const MAX_HASHTAGS: usize = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template not found: {0}")]
    NotFound(String),
    #[error("template name must be 1-100 characters")]
    InvalidName,
    #[error("caption must be 1-2200 characters")]
    InvalidCaption,
    #[error("too many hashtags: {0} (max 30)")]
    TooManyHashtags(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplatePlatform {
    Instagram,
    Tiktok,
    Youtube,
    Whatsapp,
    Email,
    #[default]
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateCategory {
    Product,
    Promo,
    Educational,
    Entertainment,
    Testimonial,
    BehindScenes,
    Announcement,
    #[default]
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageTemplate {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub platform: TemplatePlatform,
    pub category: TemplateCategory,
    pub caption_template: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub usage_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new template.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTemplate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub platform: TemplatePlatform,
    #[serde(default)]
    pub category: TemplateCategory,
    pub caption_template: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub platform: Option<TemplatePlatform>,
    pub category: Option<TemplateCategory>,
    pub caption_template: Option<String>,
    pub hashtags: Option<Vec<String>>,
}

/// Output of [`TemplateLibrary::render`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedTemplate {
    pub caption: String,
    pub hashtags: Vec<String>,
    pub platform: TemplatePlatform,
}

fn validate_name(name: &str) -> Result<(), TemplateError> {
    let n = name.trim().chars().count();
    if n == 0 || n > MAX_NAME_LEN {
        return Err(TemplateError::InvalidName);
    }
    Ok(())
}

fn validate_caption(caption: &str) -> Result<(), TemplateError> {
    let n = caption.chars().count();
    if caption.trim().is_empty() || n > MAX_CAPTION_LEN {
        return Err(TemplateError::InvalidCaption);
    }
    Ok(())
}

fn normalize_hashtags(tags: Vec<String>) -> Result<Vec<String>, TemplateError> {
    let tags: Vec<String> = tags
        .into_iter()
        .map(|t| t.trim().trim_start_matches('#').to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if tags.len() > MAX_HASHTAGS {
        return Err(TemplateError::TooManyHashtags(tags.len()));
    }
    Ok(tags)
}

/// Templates in creation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateLibrary {
    templates: Vec<MessageTemplate>,
}

impl TemplateLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn create(&mut self, new: NewTemplate) -> Result<&MessageTemplate, TemplateError> {
        validate_name(&new.name)?;
        validate_caption(&new.caption_template)?;
        let hashtags = normalize_hashtags(new.hashtags)?;

        let now = Utc::now();
        let template = MessageTemplate {
            id: Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            description: new.description,
            platform: new.platform,
            category: new.category,
            caption_template: new.caption_template,
            hashtags,
            usage_count: 0,
            created_at: now,
            updated_at: now,
        };
        tracing::debug!(id = %template.id, name = %template.name, "template created");
        self.templates.push(template);
        Ok(&self.templates[self.templates.len() - 1])
    }

    pub fn get(&self, id: &str) -> Result<&MessageTemplate, TemplateError> {
        self.templates
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| TemplateError::NotFound(id.to_string()))
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut MessageTemplate, TemplateError> {
        self.templates
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| TemplateError::NotFound(id.to_string()))
    }

    /// Templates matching the filters, most used first.
    ///
    /// A platform filter also matches templates published for all platforms.
    pub fn list(
        &self,
        platform: Option<TemplatePlatform>,
        category: Option<TemplateCategory>,
    ) -> Vec<&MessageTemplate> {
        let mut out: Vec<&MessageTemplate> = self
            .templates
            .iter()
            .filter(|t| match platform {
                None | Some(TemplatePlatform::All) => true,
                Some(p) => t.platform == p || t.platform == TemplatePlatform::All,
            })
            .filter(|t| category.map_or(true, |c| t.category == c))
            .collect();
        out.sort_by(|a, b| b.usage_count.cmp(&a.usage_count));
        out
    }

    pub fn update(&mut self, id: &str, update: TemplateUpdate) -> Result<&MessageTemplate, TemplateError> {
        if let Some(name) = &update.name {
            validate_name(name)?;
        }
        if let Some(caption) = &update.caption_template {
            validate_caption(caption)?;
        }
        let hashtags = update.hashtags.map(normalize_hashtags).transpose()?;

        let t = self.get_mut(id)?;
        if let Some(name) = update.name {
            t.name = name.trim().to_string();
        }
        if let Some(description) = update.description {
            t.description = Some(description);
        }
        if let Some(platform) = update.platform {
            t.platform = platform;
        }
        if let Some(category) = update.category {
            t.category = category;
        }
        if let Some(caption) = update.caption_template {
            t.caption_template = caption;
        }
        if let Some(hashtags) = hashtags {
            t.hashtags = hashtags;
        }
        t.updated_at = Utc::now();
        Ok(&*t)
    }

    /// Remove a template. Returns whether it existed.
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.templates.len();
        self.templates.retain(|t| t.id != id);
        self.templates.len() != before
    }

    /// Copy a template under a new name with a fresh usage count. The copy's
    /// description records where it came from.
    pub fn duplicate(&mut self, id: &str, new_name: &str) -> Result<&MessageTemplate, TemplateError> {
        let source = self.get(id)?.clone();
        self.create(NewTemplate {
            name: new_name.to_string(),
            description: Some(format!("Cloned from: {}", source.name)),
            platform: source.platform,
            category: source.category,
            caption_template: source.caption_template,
            hashtags: source.hashtags,
        })
    }

    /// Fill `{{name}}` placeholders from `vars` and count the use.
    /// Placeholders without a value are left in place.
    pub fn render(
        &mut self,
        id: &str,
        vars: &BTreeMap<String, String>,
        include_hashtags: bool,
    ) -> Result<RenderedTemplate, TemplateError> {
        let t = self.get_mut(id)?;

        let mut caption = t.caption_template.clone();
        for (name, value) in vars {
            caption = caption.replace(&format!("{{{{{name}}}}}"), value);
        }
        if include_hashtags && !t.hashtags.is_empty() {
            let tags = t
                .hashtags
                .iter()
                .map(|h| format!("#{h}"))
                .collect::<Vec<_>>()
                .join(" ");
            caption = format!("{caption}\n\n{tags}");
        }
        t.usage_count = t.usage_count.saturating_add(1);

        Ok(RenderedTemplate {
            caption,
            hashtags: t.hashtags.clone(),
            platform: t.platform,
        })
    }
}
