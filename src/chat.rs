//! Sports chat assistant with per-session history.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::app::ChatConfig;
use crate::llm::{ChatMessage, ChatRequest, DynLlm};
use crate::store::MemoryStore;

pub const DEFAULT_SESSION: &str = "default";

pub const CHAT_SYSTEM_PROMPT: &str = "你是一个专业的体育智能助手，具有内置联网搜索功能。

**你的核心能力：**
1. 回答用户关于体育的各种问题（比赛结果、球员数据、赛事信息等）
2. 支持上下文连续对话
3. **内置联网搜索功能**：系统已为你启用了联网搜索，你可以自动从互联网获取最新的体育资讯

**联网功能说明：**
- 当用户询问\"今天\"、\"最新\"、\"实时\"、\"最近\"、\"比分\"、\"赛程\"等需要实时信息的问题时，请自动使用联网搜索功能获取最新数据
- 如果联网搜索获取到具体数据（得分、比分、统计数据等），请直接使用这些数据回答用户
- 如果联网搜索没有找到相关信息，请基于你的知识库回答，并说明这是历史数据

**回答要求：**
- 回答要准确、专业、友好
- 如果使用了联网搜索，可以在回答中说明信息来源

请友好、专业地回答用户的问题。";

#[derive(Default)]
struct Session {
    messages: Vec<ChatMessage>,
    last_used: u64,
}

#[derive(Default)]
struct Sessions {
    by_id: HashMap<String, Session>,
    clock: u64,
}

pub struct ChatService {
    llm: DynLlm,
    store: Arc<MemoryStore>,
    cfg: ChatConfig,
    sessions: Mutex<Sessions>,
}

impl ChatService {
    pub fn new(llm: DynLlm, store: Arc<MemoryStore>, cfg: ChatConfig) -> Self {
        Self {
            llm,
            store,
            cfg,
            sessions: Mutex::new(Sessions::default()),
        }
    }

    fn history(&self, session: &str) -> Vec<ChatMessage> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .get(session)
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }

    fn remember(&self, session: &str, user: &str, reply: &str) {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.clock += 1;
        let now = sessions.clock;
        if !sessions.by_id.contains_key(session) && sessions.by_id.len() >= self.cfg.max_sessions {
            // least recently used goes first
            let oldest = sessions
                .by_id
                .iter()
                .min_by_key(|(_, s)| s.last_used)
                .map(|(id, _)| id.clone());
            if let Some(id) = oldest {
                sessions.by_id.remove(&id);
                debug!(session = %id, "evicted idle chat session");
            }
        }
        let entry = sessions.by_id.entry(session.to_string()).or_default();
        entry.last_used = now;
        let h = &mut entry.messages;
        h.push(ChatMessage::user(user));
        h.push(ChatMessage::assistant(reply));
        if h.len() > self.cfg.max_history {
            let excess = h.len() - self.cfg.max_history;
            h.drain(0..excess);
        }
    }

    /// Answer one message. LLM failures become an apologetic reply, never an error.
    pub async fn reply(&self, session: &str, message: &str, preferences: Option<&Value>) -> String {
        let session = if session.trim().is_empty() { DEFAULT_SESSION } else { session };

        let mut messages = vec![ChatMessage::system(CHAT_SYSTEM_PROMPT)];
        if let Some(p) = preferences.filter(|p| !is_empty_prefs(p)) {
            messages.push(ChatMessage::system(format!("用户偏好信息：{p}")));
        }
        messages.extend(self.history(session));
        messages.push(ChatMessage::user(message));

        let req = ChatRequest {
            messages,
            temperature: self.cfg.temperature,
            enable_search: self.cfg.enable_search,
        };

        match self.llm.complete(&req).await {
            Ok(text) => {
                self.remember(session, message, &text);
                self.store.record_chat(session, message, &text);
                info!(session, reply_chars = text.chars().count(), "chat reply");
                text
            }
            Err(e) => {
                warn!(session, error = %e, "chat completion failed");
                format!("抱歉，处理您的请求时出现了错误：{e}。请稍后重试。")
            }
        }
    }

    /// Forget a session's in-memory history. Stored chat records are kept.
    pub fn reset(&self, session: &str) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .remove(session);
    }

    pub fn history_len(&self, session: &str) -> usize {
        self.history(session).len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .len()
    }
}

fn is_empty_prefs(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Object(m) => m.is_empty(),
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::{Role, ScriptedLlm};
    use serde_json::json;

    fn service(llm: Arc<ScriptedLlm>, max_history: usize) -> (ChatService, Arc<MemoryStore>) {
        let cfg = ChatConfig {
            max_history,
            ..ChatConfig::default()
        };
        service_with(llm, cfg)
    }

    fn service_with(llm: Arc<ScriptedLlm>, cfg: ChatConfig) -> (ChatService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (ChatService::new(llm, store.clone(), cfg), store)
    }

    #[tokio::test]
    async fn history_is_sent_and_capped() {
        let llm = Arc::new(ScriptedLlm::always("好的"));
        let (svc, store) = service(llm.clone(), 4);
        for q in ["一", "二", "三"] {
            svc.reply("s", q, None).await;
        }
        assert_eq!(svc.history_len("s"), 4);
        let last = llm.calls().pop().unwrap();
        // system + 2 prior turns + new question
        assert_eq!(last.messages.len(), 6);
        assert_eq!(last.messages[1].content, "一");
        assert!(last.enable_search);
        assert!((last.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(store.chat_records("s").len(), 3);
    }

    #[tokio::test]
    async fn preferences_become_second_system_message() {
        let llm = Arc::new(ScriptedLlm::always("ok"));
        let (svc, _) = service(llm.clone(), 20);
        svc.reply("", "hi", Some(&json!({"team": "湖人"}))).await;
        let req = &llm.calls()[0];
        assert_eq!(req.messages[1].role, Role::System);
        assert!(req.messages[1].content.starts_with("用户偏好信息："));
        assert_eq!(svc.history_len(DEFAULT_SESSION), 2);
    }

    #[tokio::test]
    async fn failure_yields_apology_and_keeps_history_clean() {
        let llm = Arc::new(ScriptedLlm::new(vec![Err(LlmError::Timeout)]));
        let (svc, store) = service(llm, 20);
        let reply = svc.reply("s", "比分？", None).await;
        assert!(reply.starts_with("抱歉，处理您的请求时出现了错误："));
        assert!(reply.ends_with("。请稍后重试。"));
        assert_eq!(svc.history_len("s"), 0);
        assert!(store.chat_records("s").is_empty());
    }

    #[tokio::test]
    async fn reset_clears_one_session() {
        let llm = Arc::new(ScriptedLlm::always("ok"));
        let (svc, _) = service(llm, 20);
        svc.reply("a", "x", None).await;
        svc.reply("b", "y", None).await;
        svc.reset("a");
        assert_eq!(svc.history_len("a"), 0);
        assert_eq!(svc.history_len("b"), 2);
    }

    #[tokio::test]
    async fn least_recently_used_session_is_evicted_at_capacity() {
        let llm = Arc::new(ScriptedLlm::always("ok"));
        let cfg = ChatConfig {
            max_sessions: 2,
            ..ChatConfig::default()
        };
        let (svc, _) = service_with(llm, cfg);
        svc.reply("a", "1", None).await;
        svc.reply("b", "2", None).await;
        // touching "a" leaves "b" as the idle one
        svc.reply("a", "3", None).await;
        svc.reply("c", "4", None).await;

        assert_eq!(svc.session_count(), 2);
        assert_eq!(svc.history_len("a"), 4);
        assert_eq!(svc.history_len("b"), 0);
        assert_eq!(svc.history_len("c"), 2);
    }
}
