//! Wires the turn-taking state machine, the conversational engine, the
//! ledger recorder, and the transport together into the loop that actually
//! drives one call: frames come in from the transport, transcripts get
//! aggregated into utterances, utterances get stepped through the engine
//! session, and the engine's response goes back out as frames.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::engine::aggregation::{TranscriptAggregator, TranscriptFragment};
use crate::engine::idle::{run_idle_watcher, IdleAction, IdleWatcher};
use crate::engine::{CallEngine, EngineControlSignal};
use crate::error::VoxResult;
use crate::model::Organization;
use crate::pipeline::frame::{ControlFrame, Frame, Pts};
use crate::pipeline::recording::FrameRecorder;
use crate::pipeline::transport::PipelineTransport;
use crate::pipeline::turn::TurnController;

fn audio_energy(samples: &[u8]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: u64 = samples.iter().map(|&s| s as u64).sum();
    (sum as f32) / (samples.len() as f32) / 255.0
}

pub struct PipelineProcessor {
    engine: CallEngine,
    turn_controller: TurnController,
    aggregator: TranscriptAggregator,
    transport: Arc<dyn PipelineTransport>,
    recorder: Option<FrameRecorder>,
    control_rx: mpsc::Receiver<EngineControlSignal>,
    organization: Option<Organization>,
    idle_action_rx: Option<mpsc::Receiver<IdleAction>>,
    idle_reset_tx: Option<mpsc::Sender<()>>,
    /// Set once [`Self::end_call_with_reason`] has run, so a second signal
    /// (the model's own `end_call` tool firing after an idle abandon, say)
    /// doesn't re-extract variables or re-emit `CallEnding`.
    disposed: bool,
    disposition: Option<String>,
}

impl PipelineProcessor {
    pub fn new(
        engine: CallEngine,
        turn_controller: TurnController,
        transport: Arc<dyn PipelineTransport>,
        recorder: Option<FrameRecorder>,
        control_rx: mpsc::Receiver<EngineControlSignal>,
    ) -> Self {
        Self {
            engine,
            turn_controller,
            aggregator: TranscriptAggregator::new(),
            transport,
            recorder,
            control_rx,
            organization: None,
            idle_action_rx: None,
            idle_reset_tx: None,
            disposed: false,
            disposition: None,
        }
    }

    /// Map the call's gathered disposition through the owning organization's
    /// mapping table once the call has ended.
    pub fn set_organization(&mut self, organization: Organization) {
        self.organization = Some(organization);
    }

    /// Start a background idle watcher for this call: `poll_every` governs
    /// how often silence is checked, independent of `watcher`'s own
    /// nudge/abandon thresholds.
    pub fn enable_idle_watching(&mut self, watcher: IdleWatcher, poll_every: Duration) {
        let (action_tx, action_rx) = mpsc::channel(4);
        let (reset_tx, reset_rx) = mpsc::channel(4);
        tokio::spawn(run_idle_watcher(watcher, poll_every, action_tx, reset_rx));
        self.idle_action_rx = Some(action_rx);
        self.idle_reset_tx = Some(reset_tx);
    }

    pub fn disposition(&self) -> Option<&str> {
        self.disposition.as_deref()
    }

    /// Tear the call down: extract whatever variables the active node still
    /// declares, map `call_disposition` (if the model set one) through the
    /// organization's disposition table, and emit `CallEnding` so the
    /// transport and any recorder see a terminal frame. Idempotent — calling
    /// this twice (idle abandon followed by the model's own `end_call`, say)
    /// only acts once.
    pub async fn end_call_with_reason(&mut self, reason: impl Into<String>, pts: Pts) -> VoxResult<()> {
        let reason = reason.into();
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;

        self.engine.extract_current_node_variables().await?;
        if let Some(raw) = self.engine.call_disposition() {
            let mapped = self.organization.as_ref().map(|org| org.map_disposition(raw)).unwrap_or_else(|| raw.to_string());
            self.disposition = Some(mapped);
        }

        self.transport.send(Frame::Control(ControlFrame::CallEnding { pts, reason })).await
    }

    /// Process one inbound frame. Returns a control signal if a tool raised
    /// one while the engine was stepping (end call / transfer), which the
    /// caller must act on — the processor itself has no opinion on what
    /// happens to the call afterwards.
    pub async fn handle_frame(&mut self, frame: Frame) -> VoxResult<Option<EngineControlSignal>> {
        if let Some(recorder) = &self.recorder {
            recorder.observe(&frame).await?;
        }

        match &frame {
            Frame::CallerAudio { samples, .. } => {
                self.turn_controller.observe_audio_energy(audio_energy(samples));
            }
            Frame::Transcript { text, is_final, pts } => {
                self.turn_controller.observe_caller_activity();
                if let Some(reset_tx) = &self.idle_reset_tx {
                    let _ = reset_tx.try_send(());
                }
                let fragment = TranscriptFragment { text: text.clone(), is_final: *is_final };
                if let Some(utterance) = self.aggregator.push(fragment) {
                    if self.turn_controller.raise_stop_candidate() {
                        self.transport.send(Frame::Control(ControlFrame::TurnStopConfirmed { pts: *pts })).await?;
                        let outcome = self.engine.step(&utterance).await?;
                        if let Some(content) = outcome.spoken_content {
                            self.transport.send(Frame::LlmResponse { pts: *pts, text: content }).await?;
                        }
                        self.turn_controller.agent_finished_speaking();
                    } else {
                        self.transport.send(Frame::Control(ControlFrame::TurnStopRejected { pts: *pts })).await?;
                    }
                }
            }
            Frame::Control(ControlFrame::Interruption { .. }) => {
                self.turn_controller.interrupt();
            }
            _ => {}
        }

        if let Some(idle_rx) = &mut self.idle_action_rx {
            if let Ok(action) = idle_rx.try_recv() {
                match action {
                    IdleAction::Nudge { attempt } => {
                        let nudge = format!("(the caller has gone quiet; this is nudge attempt {attempt} — check in with them)");
                        let outcome = self.engine.step(&nudge).await?;
                        if let Some(content) = outcome.spoken_content {
                            self.transport.send(Frame::LlmResponse { pts: frame.pts(), text: content }).await?;
                        }
                    }
                    IdleAction::Abandon => {
                        self.end_call_with_reason("caller unresponsive", frame.pts()).await?;
                        return Ok(Some(EngineControlSignal::EndCall {
                            reason: "caller unresponsive".into(),
                        }));
                    }
                }
            }
        }

        match self.control_rx.try_recv() {
            Ok(signal @ EngineControlSignal::EndCall { ref reason }) => {
                self.end_call_with_reason(reason.clone(), frame.pts()).await?;
                Ok(Some(signal))
            }
            Ok(signal) => Ok(Some(signal)),
            Err(_) => Ok(None),
        }
    }

    /// Drive the processor until the inbound channel closes or a tool raises
    /// a control signal.
    pub async fn run(&mut self, mut inbound: mpsc::Receiver<Frame>) -> VoxResult<Option<EngineControlSignal>> {
        while let Some(frame) = inbound.recv().await {
            if let Some(signal) = self.handle_frame(frame).await? {
                return Ok(Some(signal));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tools::HandlerRegistry;
    use crate::engine::session::{LlmClient, LlmTurn, Message};
    use crate::engine::tools::ToolMetadata;
    use crate::pipeline::turn::{StartStrategy, StopStrategy};
    use crate::workflow::{Node, NodeKind, WorkflowGraph};
    use async_trait::async_trait;
    use uuid::Uuid;

    struct AlwaysStart;
    impl StartStrategy for AlwaysStart {
        fn on_audio_energy(&mut self, _energy: f32) -> bool {
            true
        }
        fn reset(&mut self) {}
    }

    struct AlwaysStop;
    impl StopStrategy for AlwaysStop {
        fn on_stop_candidate(&mut self) -> bool {
            true
        }
        fn reset(&mut self) {}
    }

    struct EchoClient;
    #[async_trait]
    impl LlmClient for EchoClient {
        async fn complete(&self, messages: &[Message], _tools: &[ToolMetadata]) -> VoxResult<LlmTurn> {
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(LlmTurn { content: Some(format!("you said: {last}")), tool_calls: vec![] })
        }
    }

    fn single_node_graph() -> WorkflowGraph {
        WorkflowGraph {
            id: Uuid::new_v4(),
            name: "test".into(),
            entry_node: "root".into(),
            nodes: vec![Node {
                id: "root".into(),
                kind: NodeKind::Conversation,
                prompt: None,
                message: None,
                available_tools: vec![],
                extract_variables: vec![],
            }],
            edges: vec![],
        }
    }

    async fn processor() -> (PipelineProcessor, mpsc::Receiver<Frame>) {
        let engine = CallEngine::new(Arc::new(EchoClient), single_node_graph(), "be terse", HandlerRegistry::new(), 1000)
            .await
            .unwrap();
        let turn_controller = TurnController::new(vec![Box::new(AlwaysStart)], vec![Box::new(AlwaysStop)]);
        let (out_tx, out_rx) = mpsc::channel(16);
        let transport = Arc::new(crate::pipeline::transport::ChannelTransport::new(out_tx));
        let (_control_tx, control_rx) = mpsc::channel(4);
        (PipelineProcessor::new(engine, turn_controller, transport, None, control_rx), out_rx)
    }

    #[tokio::test]
    async fn final_transcript_after_caller_audio_produces_a_spoken_response() {
        let (mut processor, mut out_rx) = processor().await;

        processor.handle_frame(Frame::CallerAudio { pts: 0, samples: vec![200, 210, 220] }).await.unwrap();
        processor
            .handle_frame(Frame::Transcript { pts: 10, text: "hello".into(), is_final: true })
            .await
            .unwrap();

        let first = out_rx.recv().await.unwrap();
        assert!(matches!(first, Frame::Control(ControlFrame::TurnStopConfirmed { .. })));

        let second = out_rx.recv().await.unwrap();
        match second {
            Frame::LlmResponse { text, .. } => assert!(text.contains("hello")),
            other => panic!("expected LlmResponse, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn interim_transcripts_do_not_trigger_a_response() {
        let (mut processor, mut out_rx) = processor().await;
        processor.handle_frame(Frame::CallerAudio { pts: 0, samples: vec![200] }).await.unwrap();
        processor
            .handle_frame(Frame::Transcript { pts: 5, text: "hel".into(), is_final: false })
            .await
            .unwrap();
        assert!(out_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn control_signal_from_a_tool_is_surfaced_to_the_caller() {
        let (mut processor, mut out_rx) = processor().await;
        let (control_tx, control_rx) = mpsc::channel(4);
        processor.control_rx = control_rx;
        control_tx
            .send(EngineControlSignal::EndCall { reason: "caller hung up".into() })
            .await
            .unwrap();

        let signal = processor
            .handle_frame(Frame::CallerAudio { pts: 0, samples: vec![1] })
            .await
            .unwrap();
        assert!(matches!(signal, Some(EngineControlSignal::EndCall { .. })));
        assert!(matches!(out_rx.recv().await, Some(Frame::Control(ControlFrame::CallEnding { reason, .. })) if reason == "caller hung up"));
    }

    #[tokio::test]
    async fn end_call_with_reason_is_idempotent() {
        let (mut processor, mut out_rx) = processor().await;
        processor.end_call_with_reason("caller said goodbye", 0).await.unwrap();
        processor.end_call_with_reason("ignored second reason", 0).await.unwrap();

        assert!(matches!(out_rx.recv().await, Some(Frame::Control(ControlFrame::CallEnding { reason, .. })) if reason == "caller said goodbye"));
        assert!(out_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn idle_abandonment_ends_the_call() {
        let (mut processor, mut out_rx) = processor().await;
        let (action_tx, action_rx) = mpsc::channel(4);
        let (_reset_tx, _reset_rx) = mpsc::channel(4);
        processor.idle_action_rx = Some(action_rx);
        action_tx.send(IdleAction::Abandon).await.unwrap();

        let signal = processor
            .handle_frame(Frame::CallerAudio { pts: 0, samples: vec![1] })
            .await
            .unwrap();
        assert!(matches!(signal, Some(EngineControlSignal::EndCall { .. })));
        assert!(matches!(out_rx.recv().await, Some(Frame::Control(ControlFrame::CallEnding { .. }))));
    }
}
