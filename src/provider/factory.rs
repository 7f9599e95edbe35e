//! Builds provider instances from configuration

use std::sync::Arc;
use std::time::Duration;

use crate::config::{ProviderConfig, ProviderKind, ResolutionConfig};
use crate::error::Result;
use crate::provider::adapters::{
    att::ATT_BASE_URL, chatwith::CHATWITH_BASE_URL, decagon::DECAGON_BASE_URL,
    mycity::MYCITY_BASE_URL, scoutly::SCOUTLY_BASE_URL, shopify::SHOPIFY_BASE_URL,
    shopify::SHOPIFY_HELP_URL, AttProvider, ChatWithProvider, DecagonProvider, DecagonTenant,
    MyCityProvider, ScoutlyProvider, ShopifyProvider,
};
use crate::provider::resolve::PollConfig;
use crate::provider::traits::{PromptDecoration, Provider};
use crate::provider::transport::HttpTransport;

/// Poll settings for a provider, falling back to the global defaults
pub fn poll_config(config: &ProviderConfig, defaults: &ResolutionConfig) -> PollConfig {
    PollConfig::from_millis(
        config.poll_interval_ms.unwrap_or(defaults.poll_interval_ms),
        config.poll_timeout_ms.unwrap_or(defaults.poll_timeout_ms),
    )
}

/// Create the adapter selected by the config's kind
pub fn create_provider(
    config: &ProviderConfig,
    defaults: &ResolutionConfig,
) -> Result<Arc<dyn Provider>> {
    let timeout = Duration::from_millis(config.timeout_ms.unwrap_or(defaults.request_timeout_ms));
    let decoration = PromptDecoration::new(&config.prepend_prompt, &config.append_prompt);
    let base_url = |default: &str| config.base_url.clone().unwrap_or_else(|| default.to_string());
    let name = config.name.clone();

    let provider: Arc<dyn Provider> = match &config.kind {
        ProviderKind::Scoutly {
            language,
            session,
            initial_prompt,
        } => Arc::new(ScoutlyProvider::new(
            name,
            decoration,
            HttpTransport::new(base_url(SCOUTLY_BASE_URL), timeout)?,
            language.as_str(),
            session.clone(),
            initial_prompt,
        )),
        ProviderKind::Att => Arc::new(AttProvider::new(
            name,
            decoration,
            HttpTransport::new(base_url(ATT_BASE_URL), timeout)?,
        )),
        ProviderKind::ChatWith {
            chatbot_id,
            session_id,
        } => {
            let provider = ChatWithProvider::new(
                name,
                decoration,
                HttpTransport::new(base_url(CHATWITH_BASE_URL), timeout)?,
                chatbot_id.as_str(),
            );
            match session_id {
                Some(id) => Arc::new(provider.with_session(id.as_str())),
                None => Arc::new(provider),
            }
        }
        ProviderKind::Decagon {
            team_id,
            flow_id,
            metadata_url,
            timezone,
            session_id,
        } => {
            let provider = DecagonProvider::new(
                name,
                decoration,
                HttpTransport::new(base_url(DECAGON_BASE_URL), timeout)?,
                DecagonTenant {
                    team_id: team_id.clone(),
                    flow_id: flow_id.clone(),
                    metadata_url: metadata_url.clone(),
                    timezone: timezone.clone(),
                },
                poll_config(config, defaults),
            )?;
            match session_id {
                Some(id) => Arc::new(provider.with_session(id.as_str())),
                None => Arc::new(provider),
            }
        }
        ProviderKind::Shopify => {
            // Overriding the root moves the conversation-creation host along with it
            let help_url = base_url(SHOPIFY_HELP_URL);
            Arc::new(ShopifyProvider::new(
                name,
                decoration,
                HttpTransport::without_redirects(base_url(SHOPIFY_BASE_URL), timeout)?,
                help_url,
                poll_config(config, defaults),
            ))
        }
        ProviderKind::MyCity => Arc::new(MyCityProvider::new(
            name,
            decoration,
            HttpTransport::streaming(base_url(MYCITY_BASE_URL), timeout)?,
            Duration::from_millis(defaults.stream_timeout_ms),
        )),
    };

    Ok(provider)
}
