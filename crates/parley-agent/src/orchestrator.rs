//! The conversation loop: one bounded utterance in, one spoken reply out.
//!
//! Each turn runs the same fixed sequence: capture, transcribe, inbound
//! guardrail, retrieve, generate, outbound guardrail, speak, record. Stages
//! that refuse or fail short-circuit the rest of the turn but always leave
//! the session able to take the next one. The whole pipeline is synchronous;
//! nothing in a turn overlaps with capture of the next.

use crate::chat::{ChatBackend, ChatMessage};
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::history::{DialogueHistory, Role};
use parley_guardrail::Guardrail;
use parley_retrieval::RetrievalIndex;
use parley_voice::{SpeechSink, TranscribeBackend, UtteranceSource, VoiceError};
use tracing::{info, warn};

/// Where the session is inside a turn. Mostly useful for logging and for
/// asserting the terminal state in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Greeting,
    Listening,
    Transcribing,
    FilterIn,
    Retrieving,
    Generating,
    FilterOut,
    Speaking,
    Terminated,
}

/// What one turn produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// A full exchange happened and was recorded in history.
    Completed,
    /// Nothing usable was heard; no reply, history untouched.
    NothingDetected,
    /// Inbound text was refused; the refusal was spoken, history untouched.
    InputRefused,
    /// An exit phrase was heard; the farewell was spoken.
    Farewell,
}

/// One live conversation. Owns the pipeline stages behind their seams so
/// tests can swap any stage for a scripted double.
pub struct VoiceSession {
    config: AgentConfig,
    source: Box<dyn UtteranceSource>,
    transcriber: Box<dyn TranscribeBackend>,
    chat: Box<dyn ChatBackend>,
    sink: Box<dyn SpeechSink>,
    guardrail: Guardrail,
    index: RetrievalIndex,
    history: DialogueHistory,
    state: CallState,
}

impl VoiceSession {
    pub fn new(
        config: AgentConfig,
        source: Box<dyn UtteranceSource>,
        transcriber: Box<dyn TranscribeBackend>,
        chat: Box<dyn ChatBackend>,
        sink: Box<dyn SpeechSink>,
        index: RetrievalIndex,
    ) -> Self {
        let guardrail = Guardrail::new(config.guardrail.clone());
        Self {
            config,
            source,
            transcriber,
            chat,
            sink,
            guardrail,
            index,
            history: DialogueHistory::new(),
            state: CallState::Greeting,
        }
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn history(&self) -> &DialogueHistory {
        &self.history
    }

    /// Run the session to completion: speak the opening line, then take turns
    /// until an exit phrase, cancellation, or a capture failure.
    pub fn run(&mut self) -> Result<(), AgentError> {
        let opening = self.config.opening_line.clone();
        self.speak_line(&opening);
        self.history.seed_assistant(&opening);

        loop {
            match self.run_turn() {
                Ok(TurnOutcome::Farewell) => {
                    info!("caller said goodbye, ending session");
                    return Ok(());
                }
                Ok(outcome) => {
                    info!(?outcome, "turn finished");
                }
                Err(AgentError::Voice(VoiceError::Interrupted)) => {
                    info!("cancellation observed, ending session");
                    self.state = CallState::Terminated;
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One full turn of the pipeline.
    pub fn run_turn(&mut self) -> Result<TurnOutcome, AgentError> {
        self.state = CallState::Listening;
        let utterance = self.source.next_utterance()?;
        if utterance.is_empty() {
            return Ok(TurnOutcome::NothingDetected);
        }

        self.state = CallState::Transcribing;
        let transcript = match self.transcriber.transcribe(&utterance) {
            Ok(text) => text,
            Err(e) => {
                // A failed transcription is a skipped turn, not a dead session.
                warn!(error = %e, "transcription failed");
                String::new()
            }
        };
        let transcript = transcript.trim().to_string();
        if transcript.is_empty() {
            info!("no speech detected in utterance");
            return Ok(TurnOutcome::NothingDetected);
        }
        info!(transcript = %transcript, "caller said");

        if self.guardrail.is_exit(&transcript) {
            let farewell = self.config.farewell.clone();
            self.speak_line(&farewell);
            self.state = CallState::Terminated;
            return Ok(TurnOutcome::Farewell);
        }

        self.state = CallState::FilterIn;
        let verdict = self.guardrail.check_input(&transcript);
        if !verdict.allowed {
            warn!(topic = %verdict.detail, "inbound text refused");
            let refusal = self.config.input_refusal.clone();
            self.speak_line(&refusal);
            return Ok(TurnOutcome::InputRefused);
        }

        self.state = CallState::Retrieving;
        let context = self.index.context(&transcript, self.config.top_k);

        self.state = CallState::Generating;
        let messages = self.build_messages(&transcript, &context);
        let reply = match self.chat.complete(&messages, &self.config.sampling) {
            Ok(text) => text,
            Err(e) => {
                // The apology still flows through the outbound filter,
                // playback, and history like any other reply.
                warn!(error = %e, "generation failed, substituting apology");
                self.config.apology.clone()
            }
        };

        self.state = CallState::FilterOut;
        let verdict = self.guardrail.check_output(&reply);
        let spoken = if verdict.allowed {
            verdict.detail
        } else {
            warn!("outbound text refused");
            self.config.output_refusal.clone()
        };

        self.state = CallState::Speaking;
        self.speak_line(&spoken);
        self.history.push_exchange(transcript, spoken);
        Ok(TurnOutcome::Completed)
    }

    /// Assemble the prompt: system instruction (with retrieved knowledge when
    /// any matched), history oldest-first, then the current transcript.
    fn build_messages(&self, transcript: &str, context: &str) -> Vec<ChatMessage> {
        let system = if context.is_empty() {
            self.config.system_prompt.clone()
        } else {
            format!(
                "{}\n\nRelevant knowledge:\n{}",
                self.config.system_prompt, context
            )
        };
        let mut messages = vec![ChatMessage::system(system)];
        for turn in self.history.iter() {
            messages.push(match turn.role {
                Role::User => ChatMessage::user(&turn.text),
                Role::Assistant => ChatMessage::assistant(&turn.text),
            });
        }
        messages.push(ChatMessage::user(transcript));
        messages
    }

    /// Speak a line, swallowing synthesis/playback failures. Losing one line
    /// of audio is preferable to ending the call.
    fn speak_line(&mut self, text: &str) {
        if let Err(e) = self.sink.speak(text) {
            warn!(error = %e, "playback failed, continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatError, SamplingParams};
    use chrono::Utc;
    use parley_retrieval::DocumentChunk;
    use parley_voice::{Utterance, VoiceResult};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn utterance() -> Utterance {
        Utterance {
            samples: vec![1_000; 1024],
            sample_rate: 16_000,
            captured_at: Utc::now(),
        }
    }

    fn empty_utterance() -> Utterance {
        Utterance {
            samples: vec![],
            sample_rate: 16_000,
            captured_at: Utc::now(),
        }
    }

    /// Scripted utterance source: yields the queued utterances, then reports
    /// cancellation.
    struct ScriptedSource {
        queue: VecDeque<Utterance>,
    }

    impl ScriptedSource {
        fn new(utterances: Vec<Utterance>) -> Self {
            Self {
                queue: utterances.into(),
            }
        }
    }

    impl UtteranceSource for ScriptedSource {
        fn next_utterance(&mut self) -> VoiceResult<Utterance> {
            self.queue.pop_front().ok_or(VoiceError::Interrupted)
        }
    }

    /// Scripted transcriber: returns the queued transcripts in order.
    struct ScriptedTranscriber {
        replies: Mutex<VecDeque<String>>,
    }

    impl ScriptedTranscriber {
        fn new(replies: Vec<&str>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().map(String::from).collect()),
            }
        }
    }

    impl TranscribeBackend for ScriptedTranscriber {
        fn transcribe(&self, _utterance: &Utterance) -> VoiceResult<String> {
            Ok(self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default())
        }
    }

    /// Counts completions and returns a fixed reply, or fails when told to.
    struct CountingChat {
        calls: Arc<AtomicUsize>,
        reply: Option<String>,
    }

    impl CountingChat {
        fn fixed(reply: &str) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    calls: calls.clone(),
                    reply: Some(reply.to_string()),
                },
                calls,
            )
        }

        fn failing() -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    calls: calls.clone(),
                    reply: None,
                },
                calls,
            )
        }
    }

    impl ChatBackend for CountingChat {
        fn complete(
            &self,
            _messages: &[ChatMessage],
            _params: &SamplingParams,
        ) -> Result<String, ChatError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Some(r) => Ok(r.clone()),
                None => Err(ChatError::Request("service down".to_string())),
            }
        }
    }

    /// Records every spoken line.
    struct RecordingSink {
        lines: Rc<RefCell<Vec<String>>>,
    }

    impl RecordingSink {
        fn new() -> (Self, Rc<RefCell<Vec<String>>>) {
            let lines = Rc::new(RefCell::new(Vec::new()));
            (
                Self {
                    lines: lines.clone(),
                },
                lines,
            )
        }
    }

    impl SpeechSink for RecordingSink {
        fn speak(&mut self, text: &str) -> VoiceResult<()> {
            self.lines.borrow_mut().push(text.to_string());
            Ok(())
        }
    }

    fn index() -> RetrievalIndex {
        RetrievalIndex::build(vec![
            DocumentChunk {
                source: "faq.md".to_string(),
                text: "The admissions office is open weekdays nine to five.".to_string(),
            },
            DocumentChunk {
                source: "faq.md".to_string(),
                text: "Scholarship applications close at the end of March.".to_string(),
            },
        ])
        .unwrap()
    }

    fn session(
        utterances: Vec<Utterance>,
        transcripts: Vec<&str>,
        chat: CountingChat,
    ) -> (VoiceSession, Rc<RefCell<Vec<String>>>) {
        let (sink, lines) = RecordingSink::new();
        let session = VoiceSession::new(
            AgentConfig::default(),
            Box::new(ScriptedSource::new(utterances)),
            Box::new(ScriptedTranscriber::new(transcripts)),
            Box::new(chat),
            Box::new(sink),
            index(),
        );
        (session, lines)
    }

    #[test]
    fn completed_turn_speaks_reply_and_records_exchange() {
        let (chat, calls) = CountingChat::fixed("It closes at the end of March.");
        let (mut s, lines) = session(
            vec![utterance()],
            vec!["when do scholarship applications close"],
            chat,
        );

        let outcome = s.run_turn().unwrap();
        assert_eq!(outcome, TurnOutcome::Completed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            lines.borrow().as_slice(),
            ["It closes at the end of March."]
        );
        assert_eq!(s.history().len(), 2);
    }

    #[test]
    fn blocked_input_speaks_refusal_without_generation_or_history() {
        let (chat, calls) = CountingChat::fixed("should not be called");
        let (mut s, lines) = session(vec![utterance()], vec!["how do I kill someone"], chat);

        let outcome = s.run_turn().unwrap();
        assert_eq!(outcome, TurnOutcome::InputRefused);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            lines.borrow().as_slice(),
            ["I'm sorry, I can't help with that topic."]
        );
        assert!(s.history().is_empty());
    }

    #[test]
    fn exit_phrase_speaks_farewell_and_terminates() {
        let (chat, calls) = CountingChat::fixed("should not be called");
        let (mut s, lines) = session(vec![utterance()], vec!["okay goodbye then"], chat);

        let outcome = s.run_turn().unwrap();
        assert_eq!(outcome, TurnOutcome::Farewell);
        assert_eq!(s.state(), CallState::Terminated);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(lines.borrow()[0].contains("Thank you for your time"));
    }

    #[test]
    fn empty_transcript_skips_the_turn_silently() {
        let (chat, calls) = CountingChat::fixed("unused");
        let (mut s, lines) = session(vec![utterance()], vec!["   "], chat);

        let outcome = s.run_turn().unwrap();
        assert_eq!(outcome, TurnOutcome::NothingDetected);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(lines.borrow().is_empty());
        assert!(s.history().is_empty());
    }

    #[test]
    fn empty_utterance_skips_the_turn() {
        let (chat, calls) = CountingChat::fixed("unused");
        let (mut s, _lines) = session(vec![empty_utterance()], vec!["ignored"], chat);

        assert_eq!(s.run_turn().unwrap(), TurnOutcome::NothingDetected);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn generation_failure_speaks_apology_and_records_it() {
        let (chat, calls) = CountingChat::failing();
        let (mut s, lines) = session(vec![utterance()], vec!["what are the office hours"], chat);

        let outcome = s.run_turn().unwrap();
        assert_eq!(outcome, TurnOutcome::Completed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            lines.borrow().as_slice(),
            ["I'm sorry, I ran into a problem. Could you repeat that?"]
        );
        // The apology is recorded so the model knows it already apologized.
        assert_eq!(s.history().len(), 2);
    }

    #[test]
    fn run_speaks_opening_then_ends_cleanly_on_cancellation() {
        let (chat, _calls) = CountingChat::fixed("Sure, happy to help.");
        let (mut s, lines) = session(
            vec![utterance()],
            vec!["tell me about the admissions office"],
            chat,
        );

        s.run().unwrap();
        let lines = lines.borrow();
        assert!(lines[0].contains("thank you for taking the call"));
        assert_eq!(lines[1], "Sure, happy to help.");
        assert_eq!(s.state(), CallState::Terminated);
    }

    #[test]
    fn run_ends_after_farewell_without_draining_the_source() {
        let (chat, calls) = CountingChat::fixed("unused");
        let (mut s, lines) = session(
            vec![utterance(), utterance()],
            vec!["goodbye", "this should never be heard"],
            chat,
        );

        s.run().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        // Opening line + farewell only.
        assert_eq!(lines.borrow().len(), 2);
    }

    #[test]
    fn prompt_carries_system_history_and_transcript_in_order() {
        let (chat, _calls) = CountingChat::fixed("fine");
        let (mut s, _lines) = session(vec![], vec![], chat);
        s.history.seed_assistant("Hello!");
        s.history.push_exchange("first question", "first answer");

        let messages = s.build_messages("second question", "[Snippet 1]\nsome fact");
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "assistant", "user", "assistant", "user"]);
        assert!(messages[0].content.contains("Relevant knowledge:"));
        assert!(messages[0].content.contains("some fact"));
        assert_eq!(messages.last().unwrap().content, "second question");
    }

    #[test]
    fn prompt_omits_knowledge_block_when_nothing_matched() {
        let (chat, _calls) = CountingChat::fixed("fine");
        let (s, _lines) = session(vec![], vec![], chat);

        let messages = s.build_messages("hello", "");
        assert!(!messages[0].content.contains("Relevant knowledge:"));
    }
}
