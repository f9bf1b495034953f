//! Dispatch of tool invocations requested by the conversational model.
//!
//! Two functions are callable: `get_result` (search lookup, answered back
//! into the conversation) and `send_result` (SMS delivery, fire-and-forget
//! from the conversation's perspective). A third, `transfer_to_agent`, is
//! declared in the schema but intentionally unimplemented.

use super::events::{ClientEvent, ConversationItem, ResponseConfig, ToolDef};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};
use voxlink_core::{search::SearchProvider, sms::SmsProvider};

pub const GET_RESULT: &str = "get_result";
pub const SEND_RESULT: &str = "send_result";
pub const TRANSFER_TO_AGENT: &str = "transfer_to_agent";

/// How many results to request from the search provider per lookup.
const SEARCH_RESULT_COUNT: usize = 5;

const NO_RESULT_OUTPUT: &str = "I couldn't find a result for you.";
const SEARCH_FAILED_OUTPUT: &str = "Sorry, I encountered an error while searching for the topic.";

/// Errors that escape the dispatch boundary. Search failures never do (they
/// become a spoken apology); malformed arguments and SMS failures do, and the
/// event router decides they are not fatal to the stream.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("malformed tool arguments: {0}")]
    BadArguments(#[from] serde_json::Error),
    #[error(transparent)]
    Sms(#[from] voxlink_core::sms::SmsError),
}

/// The function schema registered during session negotiation.
pub fn tool_schema() -> Vec<ToolDef> {
    vec![
        ToolDef {
            tool_type: "function".to_string(),
            name: GET_RESULT.to_string(),
            description: "Get results based on the search query.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The topic the user is interested in.",
                    },
                },
                "required": ["query"],
            }),
        },
        ToolDef {
            tool_type: "function".to_string(),
            name: SEND_RESULT.to_string(),
            description: "Send a link to the search results.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"url": {"type": "string"}},
                "required": ["url"],
            }),
        },
        ToolDef {
            tool_type: "function".to_string(),
            name: TRANSFER_TO_AGENT.to_string(),
            description: "Escalate the conversation to a human agent.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {},
            }),
        },
    ]
}

#[derive(Deserialize)]
struct GetResultArgs {
    query: String,
}

#[derive(Deserialize)]
struct SendResultArgs {
    url: String,
}

/// Stateless adapter from completed function-call events to provider calls.
pub struct ToolInvoker {
    search: Arc<dyn SearchProvider>,
    sms: Arc<dyn SmsProvider>,
    sms_from: String,
    sms_to: String,
}

impl ToolInvoker {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        sms: Arc<dyn SmsProvider>,
        sms_from: String,
        sms_to: String,
    ) -> Self {
        Self {
            search,
            sms,
            sms_from,
            sms_to,
        }
    }

    /// Dispatches one completed tool call by function name.
    ///
    /// Returns the client events to send into the session, in order; each
    /// must go out as its own message.
    pub async fn dispatch(
        &self,
        function: &str,
        call_id: &str,
        arguments: &str,
    ) -> Result<Vec<ClientEvent>, ToolError> {
        match function {
            GET_RESULT => {
                let args: GetResultArgs = serde_json::from_str(arguments)?;
                Ok(self.get_result(call_id, &args.query).await)
            }
            SEND_RESULT => {
                let args: SendResultArgs = serde_json::from_str(arguments)?;
                self.send_result(&args.url).await?;
                Ok(Vec::new())
            }
            TRANSFER_TO_AGENT => {
                // Declared in the schema, not implemented.
                Ok(Vec::new())
            }
            other => {
                warn!(function = %other, %call_id, "ignoring call to undeclared function");
                Ok(Vec::new())
            }
        }
    }

    async fn get_result(&self, call_id: &str, query: &str) -> Vec<ClientEvent> {
        let urls = match self.search.search(query, SEARCH_RESULT_COUNT).await {
            Ok(urls) => urls,
            Err(e) => {
                // The apology goes into the conversation; the cause stays in
                // the logs.
                error!(%call_id, error = %e, "search lookup failed");
                return vec![output_item(call_id, SEARCH_FAILED_OUTPUT)];
            }
        };

        match urls.first().filter(|url| !url.is_empty()) {
            None => vec![output_item(call_id, NO_RESULT_OUTPUT)],
            Some(url) => {
                let link_line = format!("Here is a link for you: {url}");
                vec![
                    output_item(call_id, &link_line),
                    ClientEvent::ResponseCreate {
                        response: Some(ResponseConfig {
                            modalities: vec!["text".to_string(), "audio".to_string()],
                            instructions: format!(
                                "Respond to the user that you found {link_line}. Be concise and friendly."
                            ),
                        }),
                    },
                ]
            }
        }
    }

    /// Delivers the url over SMS to the preconfigured recipient. No output
    /// item goes back into the conversation.
    async fn send_result(&self, url: &str) -> Result<(), ToolError> {
        let body = format!("Hello from Search Assistant! Here is the link you requested:\n\n{url}");
        let recipients = std::slice::from_ref(&self.sms_to);
        let outcomes = self.sms.send(&self.sms_from, recipients, &body).await?;

        for outcome in &outcomes {
            if outcome.successful {
                info!(to = %outcome.to, message_id = ?outcome.message_id, "SMS sent");
            } else {
                error!(to = %outcome.to, error = ?outcome.error, "Failed to send SMS");
            }
        }
        Ok(())
    }
}

fn output_item(call_id: &str, output: &str) -> ClientEvent {
    ClientEvent::ConversationItemCreate {
        item: ConversationItem::function_call_output(call_id, output),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use mockall::mock;
    use voxlink_core::{
        search::{SearchError, SearchProvider},
        sms::{SmsError, SmsOutcome, SmsProvider},
    };

    mock! {
        pub Search {}

        #[async_trait]
        impl SearchProvider for Search {
            async fn search(&self, query: &str, count: usize) -> Result<Vec<String>, SearchError>;
        }
    }

    mock! {
        pub Sms {}

        #[async_trait]
        impl SmsProvider for Sms {
            async fn send(
                &self,
                from: &str,
                to: &[String],
                body: &str,
            ) -> Result<Vec<SmsOutcome>, SmsError>;
        }
    }

    pub fn sms_outcome(to: &str, successful: bool) -> SmsOutcome {
        SmsOutcome {
            to: to.to_string(),
            successful,
            message_id: successful.then(|| "SM1".to_string()),
            error: (!successful).then(|| "undeliverable".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{MockSearch, MockSms, sms_outcome};
    use super::*;
    use voxlink_core::search::SearchError;

    fn invoker(search: MockSearch, sms: MockSms) -> ToolInvoker {
        ToolInvoker::new(
            Arc::new(search),
            Arc::new(sms),
            "+15550100".to_string(),
            "+15550199".to_string(),
        )
    }

    fn no_sms() -> MockSms {
        let mut sms = MockSms::new();
        sms.expect_send().never();
        sms
    }

    #[tokio::test]
    async fn get_result_announces_first_link() {
        let mut search = MockSearch::new();
        search
            .expect_search()
            .withf(|query, count| query == "capital of france" && *count == 5)
            .returning(|_, _| Ok(vec!["https://example.com/a".to_string()]));

        let events = invoker(search, no_sms())
            .dispatch(GET_RESULT, "call-1", r#"{"query":"capital of france"}"#)
            .await
            .unwrap();

        assert_eq!(events.len(), 2);
        let ClientEvent::ConversationItemCreate { item } = &events[0] else {
            panic!("first event must be the tool output");
        };
        assert_eq!(item.call_id.as_deref(), Some("call-1"));
        assert_eq!(
            item.output.as_deref(),
            Some("Here is a link for you: https://example.com/a")
        );

        let ClientEvent::ResponseCreate {
            response: Some(response),
        } = &events[1]
        else {
            panic!("second event must be the response request");
        };
        assert!(response.instructions.contains("https://example.com/a"));
        assert_eq!(response.modalities, vec!["text", "audio"]);
    }

    #[tokio::test]
    async fn get_result_with_no_results_does_not_request_a_response() {
        let mut search = MockSearch::new();
        search.expect_search().returning(|_, _| Ok(vec![]));

        let events = invoker(search, no_sms())
            .dispatch(GET_RESULT, "call-2", r#"{"query":"nothing"}"#)
            .await
            .unwrap();

        assert_eq!(events.len(), 1);
        let ClientEvent::ConversationItemCreate { item } = &events[0] else {
            panic!("expected a tool output item");
        };
        assert_eq!(item.call_id.as_deref(), Some("call-2"));
        assert_eq!(item.output.as_deref(), Some(NO_RESULT_OUTPUT));
    }

    #[tokio::test]
    async fn get_result_provider_failure_becomes_an_apology() {
        let mut search = MockSearch::new();
        search
            .expect_search()
            .returning(|_, _| Err(SearchError::EmptyQuery));

        let events = invoker(search, no_sms())
            .dispatch(GET_RESULT, "call-3", r#"{"query":"x"}"#)
            .await
            .unwrap();

        assert_eq!(events.len(), 1);
        let ClientEvent::ConversationItemCreate { item } = &events[0] else {
            panic!("expected a tool output item");
        };
        assert_eq!(item.output.as_deref(), Some(SEARCH_FAILED_OUTPUT));
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, ClientEvent::ResponseCreate { .. }))
        );
    }

    #[tokio::test]
    async fn send_result_is_fire_and_forget() {
        let mut sms = MockSms::new();
        sms.expect_send()
            .withf(|from, to, body| {
                from == "+15550100"
                    && to.len() == 1
                    && to[0] == "+15550199"
                    && body.contains("https://x/y")
            })
            .returning(|_, to, _| Ok(vec![sms_outcome(&to[0], true)]));

        let mut search = MockSearch::new();
        search.expect_search().never();

        let events = invoker(search, sms)
            .dispatch(SEND_RESULT, "call-4", r#"{"url":"https://x/y"}"#)
            .await
            .unwrap();

        // No output item ever answers a send_result call.
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn send_result_tolerates_partial_recipient_failure() {
        let mut sms = MockSms::new();
        sms.expect_send().returning(|_, _, _| {
            Ok(vec![
                sms_outcome("+15550199", true),
                sms_outcome("+15550198", false),
            ])
        });

        let mut search = MockSearch::new();
        search.expect_search().never();

        let result = invoker(search, sms)
            .dispatch(SEND_RESULT, "call-5", r#"{"url":"https://x/y"}"#)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn send_result_provider_error_is_raised() {
        let mut sms = MockSms::new();
        sms.expect_send()
            .returning(|_, _, _| Err(voxlink_core::sms::SmsError::NoRecipients));

        let mut search = MockSearch::new();
        search.expect_search().never();

        let err = invoker(search, sms)
            .dispatch(SEND_RESULT, "call-6", r#"{"url":"https://x/y"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Sms(_)));
    }

    #[tokio::test]
    async fn malformed_arguments_are_rejected() {
        let err = invoker(MockSearch::new(), no_sms())
            .dispatch(GET_RESULT, "call-7", "not json")
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::BadArguments(_)));
    }

    #[tokio::test]
    async fn transfer_to_agent_is_a_no_op() {
        let events = invoker(MockSearch::new(), no_sms())
            .dispatch(TRANSFER_TO_AGENT, "call-8", "{}")
            .await
            .unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn undeclared_function_is_ignored() {
        let events = invoker(MockSearch::new(), no_sms())
            .dispatch("delete_everything", "call-9", "{}")
            .await
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn schema_declares_three_functions() {
        let schema = tool_schema();
        let names: Vec<_> = schema.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec![GET_RESULT, SEND_RESULT, TRANSFER_TO_AGENT]);
        assert!(schema.iter().all(|t| t.tool_type == "function"));
    }
}
