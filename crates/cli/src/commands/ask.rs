use std::sync::Arc;

use aura_agent::{CognitiveRouter, ConversationHistory, Reply, ReplyStatus};
use aura_core::store::CrmStore;
use aura_core::KnowledgeBase;
use aura_db::SqlCrmStore;

use crate::commands::{finish, open_database, prepare, CommandResult, Failure};

pub fn run(text: &str) -> CommandResult {
    let (config, runtime) = match prepare("ask") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let knowledge = KnowledgeBase::load_or_default(config.knowledge.path.as_deref())
            .map_err(|error| ("knowledge", error.to_string(), 7u8))?;
        let pool = open_database(&config).await?;
        let store: Arc<dyn CrmStore> = Arc::new(SqlCrmStore::new(pool.clone()));

        let router = CognitiveRouter::from_config(&config, store, Arc::new(knowledge));
        let reply = router.route(text, &ConversationHistory::new()).await;
        pool.close().await;

        outcome(reply)
    });

    finish("ask", result)
}

/// A reply that still answered the question counts as success, even when
/// classification fell back to generation.
fn outcome(reply: Reply) -> Result<String, Failure> {
    match reply.status {
        ReplyStatus::GenerationUnavailable => Err(("generation_unavailable", reply.text, 8)),
        ReplyStatus::DataUnavailable => Err(("data_unavailable", reply.text, 4)),
        ReplyStatus::ToolFailed => Err(("tool_failed", reply.text, 9)),
        _ => Ok(reply.text),
    }
}

#[cfg(test)]
mod tests {
    use aura_agent::{Reply, ReplyStatus, Tier};

    use super::outcome;

    fn reply(status: ReplyStatus, text: &str) -> Reply {
        Reply {
            text: text.to_string(),
            source_tier: Tier::Generation,
            tool_used: None,
            status,
            correlation_id: "cid-1".to_string(),
            data: None,
        }
    }

    #[test]
    fn answered_and_fallback_replies_succeed() {
        assert_eq!(outcome(reply(ReplyStatus::Answered, "hi")), Ok("hi".to_string()));
        assert_eq!(
            outcome(reply(ReplyStatus::ClassificationUnavailable, "best effort")),
            Ok("best effort".to_string())
        );
    }

    #[test]
    fn degraded_replies_map_to_error_classes() {
        let Err((class, _, code)) = outcome(reply(ReplyStatus::GenerationUnavailable, "sorry"))
        else {
            panic!("generation failure should be an error");
        };
        assert_eq!((class, code), ("generation_unavailable", 8));

        let Err((class, _, code)) = outcome(reply(ReplyStatus::DataUnavailable, "sorry")) else {
            panic!("data failure should be an error");
        };
        assert_eq!((class, code), ("data_unavailable", 4));

        let Err((class, _, code)) = outcome(reply(ReplyStatus::ToolFailed, "sorry")) else {
            panic!("handler failure should be an error");
        };
        assert_eq!((class, code), ("tool_failed", 9));
    }
}
