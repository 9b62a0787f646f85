use std::net::Ipv4Addr;
use std::time::Duration;

use reqwest::Url;

use super::{CareerCoach, ModelTier, Prompt, required};
use crate::error::{AgentError, CoachError};

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const MIN_EXTRACTED_CHARS: usize = 50;
const FETCH_ERROR_PREFIX: &str = "FETCH_ERROR:";
const PROTECTED_SITES: [&str; 4] = [
    "linkedin.com",
    "indeed.com",
    "glassdoor.com",
    "ziprecruiter.com",
];

const SCRAPER_INSTRUCTION: &str = "You are a web content extraction engine. \
You return the cleaned job description found at a URL as plain text.";

/// Adds `https://` when no scheme is given and checks that the host looks
/// routable.
pub fn normalize_job_url(raw: &str) -> Result<Url, CoachError> {
    let raw = required("url", raw)?;
    let lower = raw.to_ascii_lowercase();
    let with_scheme = if lower.starts_with("http://") || lower.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };

    let url = Url::parse(&with_scheme).map_err(|_| {
        CoachError::invalid_input("The URL you entered appears to be invalid. Please double-check it.")
    })?;
    let host = url.host_str().unwrap_or_default();
    let is_ipv4 = host.parse::<Ipv4Addr>().is_ok();
    if !host.contains('.') && host != "localhost" && !is_ipv4 {
        return Err(CoachError::invalid_input(format!(
            "The URL hostname \"{host}\" seems to be missing a top-level domain."
        )));
    }
    Ok(url)
}

fn is_protected(url: &Url) -> bool {
    let host = url.host_str().unwrap_or_default();
    PROTECTED_SITES
        .iter()
        .any(|site| host == *site || host.ends_with(&format!(".{site}")))
}

impl CareerCoach {
    /// Extracts the job description behind `url`.
    ///
    /// A `FETCH_ERROR:<code>` reply becomes [`CoachError::Scrape`]. The whole
    /// extraction is bounded by a 15 second timeout.
    pub async fn fetch_job_description(&self, url: &str) -> Result<String, CoachError> {
        let url = normalize_job_url(url)?;
        if is_protected(&url) {
            tracing::warn!(url = %url, "job_board_may_block_extraction");
        }

        let prompt = Prompt::new(ModelTier::Flash, SCRAPER_INSTRUCTION).grounded();
        let message = format!(
            "Visit the URL below and return the cleaned job description as plain text.\n\
1. Locate the main job description body (ignore nav, footer, cookie banners, related job lists).\n\
2. Preserve paragraphs and headings using simple markdown.\n\
3. If content loads via JSON (e.g., application/ld+json), extract its description field.\n\
4. If all extraction attempts fail, return a single failure code prefixed with \"{FETCH_ERROR_PREFIX}\" \
using one of NOT_FOUND, ACCESS_DENIED, SERVER_ERROR, NO_CONTENT, TIMEOUT.\n\n\
URL: {url}"
        );

        let extracted = tokio::time::timeout(FETCH_TIMEOUT, self.generate(&prompt, &message))
            .await
            .map_err(|_| AgentError::Timeout(FETCH_TIMEOUT))??;
        let extracted = extracted.trim();

        if let Some(code) = extracted.strip_prefix(FETCH_ERROR_PREFIX) {
            let code = code.trim().to_string();
            tracing::warn!(url = %url, code = %code, "job_description_fetch_failed");
            return Err(CoachError::Scrape { code });
        }
        if extracted.chars().count() < MIN_EXTRACTED_CHARS {
            return Err(CoachError::invalid_input(
                "The AI returned very little content from the URL. Please paste the job description manually.",
            ));
        }
        Ok(extracted.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::coach::testing::{ScriptedModel, coach, reply};
    use crate::error::ProviderError;
    use crate::llm::{ChatModel, ModelCompletion, ModelRequest};

    #[test]
    fn scheme_is_added_when_missing() {
        let url = normalize_job_url("jobs.example.com/role/42").expect("valid");
        assert_eq!(url.as_str(), "https://jobs.example.com/role/42");

        let url = normalize_job_url("http://example.org").expect("valid");
        assert_eq!(url.scheme(), "http");
    }

    #[test]
    fn hosts_without_a_tld_are_rejected() {
        let err = normalize_job_url("careers").expect_err("no tld");
        assert_eq!(
            err.to_string(),
            "The URL hostname \"careers\" seems to be missing a top-level domain."
        );
        assert!(normalize_job_url("localhost:8080/job").is_ok());
        assert!(normalize_job_url("http://10.0.0.7/job").is_ok());
    }

    #[test]
    fn unparseable_urls_get_a_friendly_message() {
        let err = normalize_job_url("https://exa mple.com").expect_err("invalid");
        assert_eq!(
            err.to_string(),
            "The URL you entered appears to be invalid. Please double-check it."
        );
    }

    #[test]
    fn protected_boards_are_detected_without_www() {
        let url = normalize_job_url("www.linkedin.com/jobs/view/1").expect("valid");
        assert!(is_protected(&url));
        let url = normalize_job_url("boards.greenhouse.io/acme").expect("valid");
        assert!(!is_protected(&url));
    }

    #[test]
    fn protected_boards_match_on_the_host_suffix() {
        let url = normalize_job_url("https://de.indeed.com/viewjob?jk=1").expect("valid");
        assert!(is_protected(&url));
        let url = normalize_job_url("https://linkedin.com.example.org/jobs/1").expect("valid");
        assert!(!is_protected(&url));
        let url = normalize_job_url("https://notlinkedin.com/jobs/1").expect("valid");
        assert!(!is_protected(&url));
    }

    #[tokio::test]
    async fn fetch_error_codes_become_scrape_errors() {
        let model = ScriptedModel::new(vec![reply("FETCH_ERROR: ACCESS_DENIED")]);

        let err = coach(&model)
            .fetch_job_description("acme.com/jobs/1")
            .await
            .expect_err("scrape error");

        assert!(matches!(err, CoachError::Scrape { ref code } if code == "ACCESS_DENIED"));
        let request = model.only_request();
        assert_eq!(request.settings.model, "gemini-2.5-flash");
        assert!(request.prompt().ends_with("URL: https://acme.com/jobs/1"));
    }

    #[tokio::test]
    async fn thin_extractions_are_rejected() {
        let model = ScriptedModel::new(vec![reply("Apply now!")]);
        let err = coach(&model)
            .fetch_job_description("acme.com/jobs/1")
            .await
            .expect_err("too short");
        assert!(err.to_string().starts_with("The AI returned very little content"));
    }

    #[tokio::test]
    async fn extracted_text_is_trimmed() {
        let body = "## Backend Engineer\nWe are hiring a backend engineer to build Rust services.";
        let model = ScriptedModel::new(vec![reply(&format!("\n{body}\n\n"))]);
        let text = coach(&model)
            .fetch_job_description("https://acme.com/jobs/1")
            .await
            .expect("text");
        assert_eq!(text, body);
    }

    struct StalledModel;

    #[async_trait]
    impl ChatModel for StalledModel {
        async fn invoke(
            &self,
            _request: ModelRequest<'_>,
        ) -> Result<ModelCompletion, ProviderError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ModelCompletion::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn extraction_is_bounded_by_the_fetch_timeout() {
        let coach = CareerCoach::new(std::sync::Arc::new(StalledModel)).with_retries(0);

        let err = coach
            .fetch_job_description("acme.com/jobs/1")
            .await
            .expect_err("timeout");

        assert!(matches!(
            err,
            CoachError::Agent(AgentError::Timeout(d)) if d == FETCH_TIMEOUT
        ));
    }
}
