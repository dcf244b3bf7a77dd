use rusqlite::Connection;
use serde::Serialize;

use super::analysis::generate_analysis;
use super::chat::generate_reply;
use super::extraction::extract_structured_data;
use super::follow_up::compose_follow_up;
use super::indexer;
use super::retrieval::retrieve_context;
use super::translate::translate_text;
use super::triage::classify;
use super::{Collaborators, Deadline, PipelineError, NO_PREVIOUS_VISIT};
use crate::db;
use crate::models::*;

/// Minimum conversation length for a visit analysis.
pub const MIN_ANALYSIS_MESSAGES: usize = 2;

/// Result of the end-of-visit flow.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitAnalysis {
    /// Narrative analysis, translated to the requested locale.
    pub analysis: String,
    pub structured_data: StructuredData,
    /// The verdict when it raised an alert, `None` otherwise.
    pub alert: Option<TriageVerdict>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FollowUp {
    pub question: String,
    pub session: VisitSession,
}

/// One pipeline call over a borrowed connection and collaborator set.
///
/// Coordinates: retrieve → generate → translate for chat turns and
/// extract → analyze → classify → (alert) → translate at the end of a visit.
/// Stages run in order; the deadline is shared by every stage of the call.
pub struct VisitPipeline<'a> {
    conn: &'a Connection,
    collaborators: &'a Collaborators,
    deadline: Deadline,
}

impl<'a> VisitPipeline<'a> {
    pub fn new(conn: &'a Connection, collaborators: &'a Collaborators, deadline: Deadline) -> Self {
        Self {
            conn,
            collaborators,
            deadline,
        }
    }

    /// Split a transcript into sentences and store each as a context chunk.
    pub fn index_transcript(&self, visit_id: &str, transcript: &str) -> Result<usize, PipelineError> {
        indexer::index_transcript(
            self.collaborators.embedder.as_ref(),
            self.collaborators.vectors.as_ref(),
            visit_id,
            transcript,
            &self.deadline,
        )
    }

    /// Produce the next assistant utterance for a visit conversation.
    pub fn chat(
        &self,
        visit_id: &str,
        messages: &[ChatMessage],
        target_language: Option<&str>,
    ) -> Result<String, PipelineError> {
        if messages.is_empty() {
            return Err(PipelineError::InvalidInput("messages must not be empty".into()));
        }

        let utterance = messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        tracing::info!(visit_id = %visit_id, history = messages.len(), "Chat turn");

        let context = retrieve_context(
            self.collaborators.embedder.as_ref(),
            self.collaborators.vectors.as_ref(),
            visit_id,
            utterance,
            &self.deadline,
        )?;
        let reply = generate_reply(
            self.collaborators.llm.as_ref(),
            visit_id,
            messages,
            &context,
            &self.deadline,
        )?;

        translate_text(
            self.collaborators.translator.as_ref(),
            &reply,
            target_language,
            &self.deadline,
        )
    }

    /// End-of-visit flow. Persists an alert exactly when the verdict raises
    /// one; the session itself is only written by an explicit save.
    pub fn analyze(
        &self,
        visit_id: &str,
        messages: &[ChatMessage],
        target_language: Option<&str>,
    ) -> Result<VisitAnalysis, PipelineError> {
        if messages.len() < MIN_ANALYSIS_MESSAGES {
            return Err(PipelineError::InvalidInput(format!(
                "analysis needs at least {MIN_ANALYSIS_MESSAGES} messages"
            )));
        }
        tracing::info!(visit_id = %visit_id, history = messages.len(), "Analyzing visit");

        let llm = self.collaborators.llm.as_ref();

        let structured_data =
            match extract_structured_data(llm, visit_id, messages, &self.deadline) {
                Ok(record) => StructuredData::Record(record),
                Err(e @ PipelineError::Cancelled { .. }) => return Err(e),
                Err(e) => {
                    tracing::warn!(visit_id = %visit_id, error = %e, "Extraction failed, analyzing raw transcript");
                    StructuredData::extraction_failed()
                }
            };

        let analysis = generate_analysis(llm, visit_id, messages, &structured_data, &self.deadline)?;

        let classification = classify(llm, visit_id, &analysis, Some(&structured_data), &self.deadline)?;
        let alert = if classification.verdict.alert {
            let record = Alert::from_verdict(
                visit_id,
                &classification.verdict,
                messages,
                classification.raw_inference.clone(),
            );
            db::insert_alert(self.conn, &record)?;
            tracing::warn!(
                visit_id = %visit_id,
                alert_id = %record.id,
                severity = %record.severity,
                label = %record.label,
                "Clinical alert raised"
            );
            Some(classification.verdict)
        } else {
            tracing::info!(visit_id = %visit_id, "Routine visit, no alert raised");
            None
        };

        let analysis = translate_text(
            self.collaborators.translator.as_ref(),
            &analysis,
            target_language,
            &self.deadline,
        )?;

        Ok(VisitAnalysis {
            analysis,
            structured_data,
            alert,
        })
    }

    /// Append a follow-up question to the saved session of `visit_id`.
    ///
    /// The write is guarded by the version read here, so a concurrent save
    /// surfaces as a version conflict instead of being overwritten.
    pub fn follow_up(&self, visit_id: &str) -> Result<FollowUp, PipelineError> {
        let mut session = db::get_session_by_visit(self.conn, visit_id)?
            .ok_or_else(|| PipelineError::NotFound(NO_PREVIOUS_VISIT.to_string()))?;

        let question = compose_follow_up(self.collaborators.llm.as_ref(), &session, &self.deadline)?;
        session.messages.push(ChatMessage::assistant(question.as_str()));

        let saved = db::upsert_session(self.conn, &SessionWrite::from(&session), Some(session.version))?;
        tracing::info!(visit_id = %visit_id, version = saved.version, "Follow-up question appended");

        Ok(FollowUp {
            question,
            session: saved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{open_memory_database, DatabaseError};
    use crate::pipeline::testing::*;
    use crate::pipeline::Stage;
    use std::sync::Arc;
    use std::time::Duration;

    const RECORD_JSON: &str = r#"{"main_complaint": "Chest pain", "all_symptoms": [{"symptom": "chest pain", "severity": "severe", "value": "yes"}], "duration_mentioned": "1 hour", "medications_mentioned": [], "potential_conditions_mentioned": []}"#;
    const HIGH_VERDICT: &str = r#"{"alert": true, "severity": "high", "label": "Difficulty Breathing", "reason": "Chest pain with breathlessness", "recommendedAction": "Emergency referral"}"#;
    const LOW_VERDICT: &str = r#"{"alert": false, "severity": "low", "label": "Routine", "reason": "Minor cold", "recommendedAction": "Rest"}"#;

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(30))
    }

    fn conversation() -> Vec<ChatMessage> {
        vec![
            ChatMessage::user("Patient has chest pain and difficulty breathing."),
            ChatMessage::assistant("When did the pain start?"),
        ]
    }

    fn alert_count(conn: &Connection) -> usize {
        db::list_alerts(conn).unwrap().len()
    }

    #[test]
    fn chat_translates_generated_reply() {
        let conn = open_memory_database().unwrap();
        let llm = Arc::new(MockLlmClient::new(&[
            "Does it hurt when you breathe?",
            "How long has it lasted?",
        ]));
        let collaborators = mock_collaborators(llm.clone());
        let pipeline = VisitPipeline::new(&conn, &collaborators, deadline());

        let reply = pipeline.chat("v1", &conversation(), Some("hi-IN")).unwrap();
        assert_eq!(reply, "[hi-IN] Does it hurt when you breathe?");

        let reply = pipeline.chat("v1", &conversation(), Some("en-US")).unwrap();
        assert_eq!(reply, "How long has it lasted?");
        assert_eq!(llm.call_count(), 2);
    }

    #[test]
    fn chat_survives_best_effort_stage_failures() {
        let conn = open_memory_database().unwrap();
        let llm = Arc::new(MockLlmClient::new(&["Is the breathing worse lying down?"]));
        let collaborators = Collaborators {
            llm: llm.clone(),
            embedder: Arc::new(MockEmbedder::failing()),
            vectors: Arc::new(MockVectorStore::failing()),
            translator: Arc::new(MockTranslator::failing()),
        };
        let pipeline = VisitPipeline::new(&conn, &collaborators, deadline());

        let reply = pipeline.chat("v1", &conversation(), Some("ta-IN")).unwrap();
        assert_eq!(reply, "Is the breathing worse lying down?");
        assert_eq!(llm.call_count(), 1);
    }

    #[test]
    fn chat_uses_indexed_context() {
        let conn = open_memory_database().unwrap();
        let llm = Arc::new(MockLlmClient::new(&["Any fever?"]));
        let collaborators = mock_collaborators(llm.clone());
        let pipeline = VisitPipeline::new(&conn, &collaborators, deadline());

        assert_eq!(
            pipeline
                .index_transcript("v1", "Patient has fever. She also has a cough.")
                .unwrap(),
            2
        );
        pipeline
            .chat("v1", &[ChatMessage::user("Patient has fever.")], None)
            .unwrap();

        let system = &llm.requests()[0].turns[0].text;
        assert!(system.contains("Context Document 1:\nPatient has fever. (Similarity: 1.0000)"));
    }

    #[test]
    fn chat_rejects_empty_history() {
        let conn = open_memory_database().unwrap();
        let collaborators = mock_collaborators(Arc::new(MockLlmClient::new(&[])));
        let pipeline = VisitPipeline::new(&conn, &collaborators, deadline());
        assert!(matches!(
            pipeline.chat("v1", &[], None),
            Err(PipelineError::InvalidInput(_))
        ));
    }

    #[test]
    fn analyze_high_severity_persists_one_alert() {
        let conn = open_memory_database().unwrap();
        let llm = Arc::new(MockLlmClient::new(&[RECORD_JSON, "Severe chest pain, Difficulty Breathing.", HIGH_VERDICT]));
        let collaborators = mock_collaborators(llm.clone());
        let pipeline = VisitPipeline::new(&conn, &collaborators, deadline());

        let result = pipeline.analyze("v1", &conversation(), None).unwrap();

        assert_eq!(result.analysis, "Severe chest pain, Difficulty Breathing.");
        assert_eq!(result.structured_data.record().unwrap().main_complaint, "Chest pain");
        let verdict = result.alert.unwrap();
        assert!(verdict.alert);
        assert_eq!(verdict.severity, Severity::High);

        let alerts = db::list_alerts(&conn).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].visit_id, "v1");
        assert_eq!(alerts[0].triggering_messages, conversation());
        assert_eq!(alerts[0].raw_inference["label"], "Difficulty Breathing");
        // Nothing is saved to the session store by analysis.
        assert!(db::get_session_by_visit(&conn, "v1").unwrap().is_none());
    }

    #[test]
    fn analyze_low_severity_persists_nothing() {
        let conn = open_memory_database().unwrap();
        let llm = Arc::new(MockLlmClient::new(&[RECORD_JSON, "Mild cold.", LOW_VERDICT]));
        let collaborators = mock_collaborators(llm);
        let pipeline = VisitPipeline::new(&conn, &collaborators, deadline());

        let result = pipeline.analyze("v1", &conversation(), None).unwrap();
        assert!(result.alert.is_none());
        assert_eq!(alert_count(&conn), 0);
    }

    #[test]
    fn analyze_with_failed_extraction_uses_sentinel_and_raw_prompt() {
        let conn = open_memory_database().unwrap();
        let llm = Arc::new(MockLlmClient::new(&["not json", "Summary of raw visit.", LOW_VERDICT]));
        let collaborators = mock_collaborators(llm.clone());
        let pipeline = VisitPipeline::new(&conn, &collaborators, deadline());

        let result = pipeline.analyze("v1", &conversation(), Some("ta-IN")).unwrap();
        assert!(result.structured_data.is_failure());
        assert_eq!(result.analysis, "[ta-IN] Summary of raw visit.");

        let analysis_prompt = &llm.requests()[1].turns[0].text;
        assert!(analysis_prompt.contains("Health Worker: Patient has chest pain"));
    }

    #[test]
    fn analyze_classifier_garbage_never_alerts() {
        let conn = open_memory_database().unwrap();
        let llm = Arc::new(MockLlmClient::new(&[RECORD_JSON, "Chest pain.", "{\"alert\": \"maybe\"}"]));
        let collaborators = mock_collaborators(llm);
        let pipeline = VisitPipeline::new(&conn, &collaborators, deadline());

        let result = pipeline.analyze("v1", &conversation(), None).unwrap();
        assert!(result.alert.is_none());
        assert_eq!(alert_count(&conn), 0);
    }

    #[test]
    fn analyze_generation_failure_propagates() {
        let conn = open_memory_database().unwrap();
        let llm = Arc::new(MockLlmClient::new(&[RECORD_JSON]));
        let collaborators = mock_collaborators(llm);
        let pipeline = VisitPipeline::new(&conn, &collaborators, deadline());

        let err = pipeline.analyze("v1", &conversation(), None).unwrap_err();
        assert!(matches!(err, PipelineError::Collaborator { stage: Stage::Analysis, .. }));
        assert_eq!(alert_count(&conn), 0);
    }

    #[test]
    fn analyze_requires_two_messages() {
        let conn = open_memory_database().unwrap();
        let collaborators = mock_collaborators(Arc::new(MockLlmClient::new(&[])));
        let pipeline = VisitPipeline::new(&conn, &collaborators, deadline());
        assert!(matches!(
            pipeline.analyze("v1", &[ChatMessage::user("only one")], None),
            Err(PipelineError::InvalidInput(_))
        ));
    }

    #[test]
    fn analyze_after_deadline_is_cancelled() {
        let conn = open_memory_database().unwrap();
        let llm = Arc::new(MockLlmClient::new(&[RECORD_JSON]));
        let collaborators = mock_collaborators(llm.clone());
        let pipeline = VisitPipeline::new(&conn, &collaborators, Deadline::expired());

        let err = pipeline.analyze("v1", &conversation(), None).unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled { stage: Stage::Extraction }));
        assert_eq!(llm.call_count(), 0);
    }

    #[test]
    fn follow_up_unknown_visit_is_not_found() {
        let conn = open_memory_database().unwrap();
        let collaborators = mock_collaborators(Arc::new(MockLlmClient::new(&["unused"])));
        let pipeline = VisitPipeline::new(&conn, &collaborators, deadline());

        match pipeline.follow_up("ghost") {
            Err(PipelineError::NotFound(message)) => assert_eq!(message, NO_PREVIOUS_VISIT),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn follow_up_appends_to_same_session() {
        let conn = open_memory_database().unwrap();
        let saved = db::upsert_session(
            &conn,
            &SessionWrite {
                visit_id: "v1".into(),
                messages: conversation(),
                analysis: Some("Chest pain, referred.".into()),
                structured_data: None,
            },
            None,
        )
        .unwrap();

        let llm = Arc::new(MockLlmClient::new(&["  Is the chest pain better today?  "]));
        let collaborators = mock_collaborators(llm);
        let pipeline = VisitPipeline::new(&conn, &collaborators, deadline());

        let follow_up = pipeline.follow_up("v1").unwrap();
        assert_eq!(follow_up.question, "Is the chest pain better today?");
        assert_eq!(follow_up.session.id, saved.id);
        assert_eq!(follow_up.session.version, saved.version + 1);

        let stored = db::get_session_by_visit(&conn, "v1").unwrap().unwrap();
        assert_eq!(stored.messages.len(), 3);
        let last = stored.messages.last().unwrap();
        assert_eq!(last.role, MessageRole::Assistant);
        assert_eq!(last.content, "Is the chest pain better today?");
    }

    #[test]
    fn alert_insert_failure_surfaces_as_database_error() {
        let conn = open_memory_database().unwrap();
        conn.execute_batch("DROP TABLE alerts;").unwrap();
        let llm = Arc::new(MockLlmClient::new(&[RECORD_JSON, "Chest pain.", HIGH_VERDICT]));
        let collaborators = mock_collaborators(llm);
        let pipeline = VisitPipeline::new(&conn, &collaborators, deadline());

        let err = pipeline.analyze("v1", &conversation(), None).unwrap_err();
        assert!(matches!(err, PipelineError::Database(DatabaseError::Sqlite(_))));
    }
}
