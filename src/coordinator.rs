//! Top-level orchestration: cache probe, history load, RAG retrieval, tool
//! preparation, ReAct/streaming dispatch, fallback, and finalization.
//!
//! This is the piece that wires every leaf module
//! (`guard`/`hook`/`intent`/`cache`/`memory`/`rag`/`tool_preparation`/
//! `react_loop`/`streaming_react_loop`/`fallback`/`finalize`) into the
//! sequence the data-flow line in the purpose section describes, the way
//! `cloudllm::agent::Agent::run_conversation_turn` is the one place that
//! calls through `LLMSession`, tool dispatch and history persistence in
//! order rather than leaving callers to sequence them by hand.

use crate::approval::{PendingApprovalStore, ToolApprovalPolicy};
use crate::cache::{fingerprint, is_cacheable, CacheEntry, ResponseCache};
use crate::chat_client::ChatClient;
use crate::config::AgentConfig;
use crate::context::RunContext;
use crate::error::AgentError;
use crate::fallback::FallbackStrategy;
use crate::finalize::{ExecutionResultFinalizer, ResponseFilter, StreamingCompletionFinalizer};
use crate::guard::GuardStage;
use crate::hook::{
    run_after_complete_hooks, AfterAgentCompleteHook, AfterToolCallHook, BeforeAgentStartHook,
    BeforeToolCallHook,
};
use crate::intent::IntentResolver;
use crate::memory::ConversationManager;
use crate::message_trimmer::MessageTrimmer;
use crate::metrics::AgentMetrics;
use crate::model::{AgentCommand, AgentResult, ExecutionMode, Media, Message, MediaRef};
use crate::output_guard::OutputGuardStage;
use crate::pre_execution::PreExecutionResolver;
use crate::rag::{retrieve_context, RagContext, RagPipeline};
use crate::react_loop::ManualReActLoop;
use crate::retry::{CircuitBreaker, RetryExecutor};
use crate::stream::StreamEventMarker;
use crate::streaming_react_loop::StreamingReActLoop;
use crate::system_prompt::SystemPromptBuilder;
use crate::token_estimator::{ApproximateTokenEstimator, TokenEstimator};
use crate::tool::ToolCallback;
use crate::tool_orchestrator::ToolCallOrchestrator;
use crate::tool_preparation::{LocalToolFilter, ToolPreparationPlanner, ToolSelector};
use std::sync::atomic::AtomicU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

fn user_message(command: &AgentCommand) -> Message {
    let mut message = Message::user(command.user_prompt.clone());
    message.media = command
        .media
        .iter()
        .map(|m: &Media| MediaRef { mime_type: m.mime_type.clone() })
        .collect();
    message
}

fn session_id(command: &AgentCommand, context: &RunContext) -> String {
    command
        .metadata
        .get("sessionId")
        .cloned()
        .unwrap_or_else(|| context.user_id.clone())
}

/// Input-length guard named by the data model invariant
/// (`userPrompt length within input bounds`). Folded into the same
/// `GUARD_REJECTED` code as the rest of the fail-close guard pipeline since
/// the taxonomy has no dedicated input-boundary code.
fn check_input_bounds(command: &AgentCommand, config: &AgentConfig) -> Result<(), AgentError> {
    let len = command.user_prompt.chars().count();
    let min = config.boundaries.input_min_chars;
    let max = config.boundaries.input_max_chars;
    if min > 0 && len < min {
        return Err(AgentError::GuardRejected {
            stage: "input_bounds".to_string(),
            reason: format!("userPrompt shorter than inputMinChars ({len} < {min})"),
        });
    }
    if max > 0 && len > max {
        return Err(AgentError::GuardRejected {
            stage: "input_bounds".to_string(),
            reason: format!("userPrompt longer than inputMaxChars ({len} > {max})"),
        });
    }
    Ok(())
}

/// Collaborators the coordinator fans out to; built once per process and
/// shared across runs via `Arc`.
pub struct AgentExecutionCoordinator {
    config: AgentConfig,
    chat_client: Arc<dyn ChatClient>,
    metrics: Arc<dyn AgentMetrics>,
    token_estimator: Arc<dyn TokenEstimator>,

    guard_stages: Vec<Arc<dyn GuardStage>>,
    before_start_hooks: Vec<Arc<dyn BeforeAgentStartHook>>,
    intent_resolver: Option<Arc<dyn IntentResolver>>,

    cache: Option<Arc<dyn ResponseCache>>,
    conversation: Arc<ConversationManager>,
    rag_pipeline: Option<Arc<dyn RagPipeline>>,

    local_tools: Vec<Arc<dyn ToolCallback>>,
    static_tool_callbacks: Vec<Arc<dyn ToolCallback>>,
    dynamic_tool_callbacks_fn: Option<Arc<dyn Fn() -> Vec<Arc<dyn ToolCallback>> + Send + Sync>>,
    local_tool_filters: Vec<Arc<dyn LocalToolFilter>>,
    tool_selector: Option<Arc<dyn ToolSelector>>,

    before_tool_call_hooks: Vec<Arc<dyn BeforeToolCallHook>>,
    after_tool_call_hooks: Vec<Arc<dyn AfterToolCallHook>>,
    approval_policy: Option<Arc<dyn ToolApprovalPolicy>>,
    approval_store: Option<Arc<dyn PendingApprovalStore>>,

    fallback_strategy: Option<Arc<dyn FallbackStrategy>>,

    output_guard_stages: Vec<Arc<dyn OutputGuardStage>>,
    response_filters: Vec<Arc<dyn ResponseFilter>>,
    after_complete_hooks: Vec<Arc<dyn AfterAgentCompleteHook>>,

    circuit_breaker: Option<Arc<CircuitBreaker>>,
}

impl AgentExecutionCoordinator {
    pub fn new(config: AgentConfig, chat_client: Arc<dyn ChatClient>, metrics: Arc<dyn AgentMetrics>) -> Result<Self, AgentError> {
        config.validate()?;
        Ok(Self {
            config,
            chat_client,
            metrics,
            token_estimator: Arc::new(ApproximateTokenEstimator),
            guard_stages: Vec::new(),
            before_start_hooks: Vec::new(),
            intent_resolver: None,
            cache: None,
            conversation: Arc::new(ConversationManager::new(None)),
            rag_pipeline: None,
            local_tools: Vec::new(),
            static_tool_callbacks: Vec::new(),
            dynamic_tool_callbacks_fn: None,
            local_tool_filters: Vec::new(),
            tool_selector: None,
            before_tool_call_hooks: Vec::new(),
            after_tool_call_hooks: Vec::new(),
            approval_policy: None,
            approval_store: None,
            fallback_strategy: None,
            output_guard_stages: Vec::new(),
            response_filters: Vec::new(),
            after_complete_hooks: Vec::new(),
            circuit_breaker: None,
        })
    }

    pub fn with_token_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.token_estimator = estimator;
        self
    }

    pub fn with_guard_stages(mut self, stages: Vec<Arc<dyn GuardStage>>) -> Self {
        self.guard_stages = stages;
        self
    }

    pub fn with_before_start_hooks(mut self, hooks: Vec<Arc<dyn BeforeAgentStartHook>>) -> Self {
        self.before_start_hooks = hooks;
        self
    }

    pub fn with_intent_resolver(mut self, resolver: Arc<dyn IntentResolver>) -> Self {
        self.intent_resolver = Some(resolver);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_conversation_store(mut self, store: Arc<dyn crate::memory::MemoryStore>) -> Self {
        self.conversation = Arc::new(ConversationManager::new(Some(store)));
        self
    }

    pub fn with_rag_pipeline(mut self, pipeline: Arc<dyn RagPipeline>) -> Self {
        self.rag_pipeline = Some(pipeline);
        self
    }

    pub fn with_local_tools(mut self, tools: Vec<Arc<dyn ToolCallback>>) -> Self {
        self.local_tools = tools;
        self
    }

    pub fn with_static_tool_callbacks(mut self, tools: Vec<Arc<dyn ToolCallback>>) -> Self {
        self.static_tool_callbacks = tools;
        self
    }

    pub fn with_dynamic_tool_callbacks_fn(mut self, f: Arc<dyn Fn() -> Vec<Arc<dyn ToolCallback>> + Send + Sync>) -> Self {
        self.dynamic_tool_callbacks_fn = Some(f);
        self
    }

    pub fn with_local_tool_filters(mut self, filters: Vec<Arc<dyn LocalToolFilter>>) -> Self {
        self.local_tool_filters = filters;
        self
    }

    pub fn with_tool_selector(mut self, selector: Arc<dyn ToolSelector>) -> Self {
        self.tool_selector = Some(selector);
        self
    }

    pub fn with_tool_call_hooks(mut self, before: Vec<Arc<dyn BeforeToolCallHook>>, after: Vec<Arc<dyn AfterToolCallHook>>) -> Self {
        self.before_tool_call_hooks = before;
        self.after_tool_call_hooks = after;
        self
    }

    pub fn with_tool_approval(mut self, policy: Arc<dyn ToolApprovalPolicy>, store: Option<Arc<dyn PendingApprovalStore>>) -> Self {
        self.approval_policy = Some(policy);
        self.approval_store = store;
        self
    }

    pub fn with_fallback_strategy(mut self, strategy: Arc<dyn FallbackStrategy>) -> Self {
        self.fallback_strategy = Some(strategy);
        self
    }

    pub fn with_output_guard_stages(mut self, stages: Vec<Arc<dyn OutputGuardStage>>) -> Self {
        self.output_guard_stages = stages;
        self
    }

    pub fn with_response_filters(mut self, filters: Vec<Arc<dyn ResponseFilter>>) -> Self {
        self.response_filters = filters;
        self
    }

    pub fn with_after_complete_hooks(mut self, hooks: Vec<Arc<dyn AfterAgentCompleteHook>>) -> Self {
        self.after_complete_hooks = hooks;
        self
    }

    pub fn with_circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = Some(breaker);
        self
    }

    pub fn metrics(&self) -> &Arc<dyn AgentMetrics> {
        &self.metrics
    }

    /// Runs the after-complete hook with a synthesized failure, for the
    /// executor's timeout/cancellation path where the coordinator's own
    /// future never reaches its normal exit.
    pub async fn run_after_complete_on_abort(&self, context: &RunContext) {
        run_after_complete_hooks(&self.after_complete_hooks, context, false, None).await;
    }

    fn pre_execution_resolver(&self) -> PreExecutionResolver {
        PreExecutionResolver::new(
            self.guard_stages.clone(),
            self.before_start_hooks.clone(),
            self.intent_resolver.clone(),
            self.metrics.clone(),
        )
    }

    fn retry_executor(&self) -> RetryExecutor<'_> {
        let retry = RetryExecutor::new(
            self.config.retry.max_attempts,
            Duration::from_millis(self.config.retry.initial_delay_ms),
            self.config.retry.multiplier,
            Duration::from_millis(self.config.retry.max_delay_ms),
        );
        match &self.circuit_breaker {
            Some(breaker) => retry.with_circuit_breaker(breaker),
            None => retry,
        }
    }

    fn all_candidate_tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .local_tools
            .iter()
            .chain(self.static_tool_callbacks.iter())
            .map(|t| t.name().to_string())
            .collect();
        if let Some(f) = &self.dynamic_tool_callbacks_fn {
            names.extend(f().iter().map(|t| t.name().to_string()));
        }
        names
    }

    async fn resolve_effective_command(&self, context: &RunContext, command: &AgentCommand) -> Result<AgentCommand, AgentError> {
        check_input_bounds(command, &self.config)?;
        let resolver = self.pre_execution_resolver();
        resolver.check_guard(command).await?;
        resolver.check_before_hooks(context).await?;
        resolver.resolve_intent(command).await
    }

    async fn fail_fast(&self, context: &RunContext, error: AgentError, started: Instant) -> AgentResult {
        let duration_ms = started.elapsed().as_millis() as u64;
        run_after_complete_hooks(&self.after_complete_hooks, context, false, None).await;
        self.metrics.record_execution(false, duration_ms, Some(error.code().as_str()));
        AgentResult::failure(&error, duration_ms)
    }

    async fn prepare_tools(&self, command: &AgentCommand) -> (Vec<Arc<dyn ToolCallback>>, Vec<crate::chat_client::ToolDefinition>) {
        if command.mode == ExecutionMode::Standard {
            return (Vec::new(), Vec::new());
        }
        let mut planner = ToolPreparationPlanner::new(self.config.max_tools_per_request)
            .with_local_filters(self.local_tool_filters.clone());
        if let Some(selector) = &self.tool_selector {
            planner = planner.with_selector(selector.clone());
        }
        let dynamic = self.dynamic_tool_callbacks_fn.as_ref().map(|f| f()).unwrap_or_default();
        planner
            .prepare(&command.user_prompt, self.local_tools.clone(), self.static_tool_callbacks.clone(), dynamic)
            .await
    }

    async fn rag_context(&self, command: &AgentCommand) -> Option<RagContext> {
        if !self.config.rag.enabled {
            return None;
        }
        retrieve_context(
            self.rag_pipeline.as_deref(),
            &command.user_prompt,
            self.config.rag.top_k,
            self.config.rag.rerank_enabled,
            &command.metadata,
        )
        .await
    }

    fn effective_max_tool_calls(&self, command: &AgentCommand) -> u32 {
        command
            .max_tool_calls
            .map(|requested| requested.min(self.config.max_tool_calls))
            .unwrap_or(self.config.max_tool_calls)
    }

    /// Runs the non-streaming path (`STANDARD`/`REACT` modes): the full
    /// sequence from cache probe through finalization.
    pub async fn execute(&self, context: &RunContext, command: AgentCommand, started: Instant) -> AgentResult {
        let effective_command = match self.resolve_effective_command(context, &command).await {
            Ok(cmd) => cmd,
            Err(err) => return self.fail_fast(context, err, started).await,
        };

        let candidate_tool_names = self.all_candidate_tool_names();
        let cacheable = self.config.cache.enabled && is_cacheable(&effective_command, self.config.cache.cacheable_temperature);
        let cache_key = if cacheable {
            Some(fingerprint(&effective_command, &candidate_tool_names))
        } else {
            None
        };

        if let Some(key) = &cache_key {
            if let Some(cache) = &self.cache {
                if let Some(entry) = cache.get(key).await {
                    self.metrics.record_cache_hit(true);
                    let duration_ms = started.elapsed().as_millis() as u64;
                    run_after_complete_hooks(&self.after_complete_hooks, context, true, Some(&entry.content)).await;
                    self.metrics.record_execution(true, duration_ms, None);
                    return AgentResult::success(entry.content, entry.tools_used, duration_ms);
                }
                self.metrics.record_cache_hit(false);
            }
        }

        let session = session_id(&effective_command, context);
        let history = self.conversation.load_history(&session).await;
        let rag_context = self.rag_context(&effective_command).await;
        let (_prepared_callbacks, tool_definitions) = self.prepare_tools(&effective_command).await;

        let system_prompt = SystemPromptBuilder::new(&effective_command.system_prompt)
            .with_rag_context(rag_context.as_ref())
            .with_response_format(effective_command.response_format, effective_command.response_schema.as_deref())
            .build();

        let user_msg = user_message(&effective_command);
        let mut messages = history;
        messages.push(user_msg.clone());

        let retry = self.retry_executor();
        let trimmer = MessageTrimmer::new(self.token_estimator.as_ref());
        let total_tool_calls = Arc::new(AtomicU32::new(0));
        let max_tool_calls = self.effective_max_tool_calls(&effective_command);
        let orchestrator = ToolCallOrchestrator::new(
            _prepared_callbacks,
            max_tool_calls,
            Duration::from_millis(self.config.concurrency.tool_call_timeout_ms),
            self.metrics.clone(),
            total_tool_calls,
        )
        .with_before_hooks(self.before_tool_call_hooks.clone())
        .with_after_hooks(self.after_tool_call_hooks.clone())
        .with_approval(self.approval_policy.clone(), self.approval_store.clone());

        let react_loop = ManualReActLoop::new(
            self.chat_client.as_ref(),
            &retry,
            &trimmer,
            &orchestrator,
            self.metrics.as_ref(),
            max_tool_calls,
            self.config.llm.max_context_window_tokens,
            self.config.llm.max_output_tokens,
        );

        let outcome = match react_loop.run(context, &effective_command, &system_prompt, messages, tool_definitions).await {
            Ok(outcome) => outcome,
            Err(err) => {
                if let Some(fallback) = &self.fallback_strategy {
                    if let Some(mut recovered) = fallback.recover(&effective_command, &err).await {
                        recovered.duration_ms = started.elapsed().as_millis() as u64;
                        run_after_complete_hooks(&self.after_complete_hooks, context, recovered.success, recovered.content.as_deref()).await;
                        self.metrics.record_execution(recovered.success, recovered.duration_ms, recovered.error_code.map(|c| c.as_str()));
                        return recovered;
                    }
                }
                return self.fail_fast(context, err, started).await;
            }
        };

        let finalizer = ExecutionResultFinalizer::new(
            self.output_guard_stages.clone(),
            self.config.boundaries.clone(),
            self.response_filters.clone(),
            self.conversation.clone(),
            self.after_complete_hooks.clone(),
            self.metrics.clone(),
        );

        let tools_used = context.tools_used();
        let result = finalizer
            .finalize(
                context,
                &session,
                &user_msg,
                outcome.content,
                tools_used,
                Some(outcome.token_usage),
                started,
                self.chat_client.as_ref(),
                &effective_command.user_prompt,
            )
            .await;

        if result.success {
            if let (Some(key), Some(cache), Some(content)) = (&cache_key, &self.cache, &result.content) {
                cache
                    .put(
                        key.clone(),
                        CacheEntry { content: content.clone(), tools_used: result.tools_used.clone() },
                        Duration::from_secs(self.config.cache.ttl_secs),
                    )
                    .await;
            }
        }

        result
    }

    /// Runs the streaming path (`STREAMING` mode). Text chunks and stream
    /// event markers are pushed onto `sender` as they occur; the caller
    /// owns the receiving half via [`crate::streaming_react_loop::new_stream_channel`].
    pub async fn execute_stream(&self, context: &RunContext, command: AgentCommand, started: Instant, sender: mpsc::Sender<String>) {
        let effective_command = match self.resolve_effective_command(context, &command).await {
            Ok(cmd) => cmd,
            Err(err) => {
                let _ = sender.send(StreamEventMarker::Error { message: err.user_message() }.encode()).await;
                self.fail_fast(context, err, started).await;
                return;
            }
        };

        let session = session_id(&effective_command, context);
        let history = self.conversation.load_history(&session).await;
        let rag_context = self.rag_context(&effective_command).await;
        let (prepared_callbacks, tool_definitions) = self.prepare_tools(&effective_command).await;

        let system_prompt = SystemPromptBuilder::new(&effective_command.system_prompt)
            .with_rag_context(rag_context.as_ref())
            .with_response_format(effective_command.response_format, effective_command.response_schema.as_deref())
            .build();

        let user_msg = user_message(&effective_command);
        let mut messages = history;
        messages.push(user_msg.clone());

        let trimmer = MessageTrimmer::new(self.token_estimator.as_ref());
        let total_tool_calls = Arc::new(AtomicU32::new(0));
        let max_tool_calls = self.effective_max_tool_calls(&effective_command);
        let orchestrator = ToolCallOrchestrator::new(
            prepared_callbacks,
            max_tool_calls,
            Duration::from_millis(self.config.concurrency.tool_call_timeout_ms),
            self.metrics.clone(),
            total_tool_calls,
        )
        .with_before_hooks(self.before_tool_call_hooks.clone())
        .with_after_hooks(self.after_tool_call_hooks.clone())
        .with_approval(self.approval_policy.clone(), self.approval_store.clone());

        let streaming_loop = StreamingReActLoop::new(
            self.chat_client.as_ref(),
            &trimmer,
            &orchestrator,
            self.metrics.as_ref(),
            max_tool_calls,
            self.config.llm.max_context_window_tokens,
            self.config.llm.max_output_tokens,
        );

        let outcome = match streaming_loop.run(context, &effective_command, &system_prompt, messages, tool_definitions, &sender).await {
            Ok(outcome) => outcome,
            Err(err) => {
                let _ = sender.send(StreamEventMarker::Error { message: err.user_message() }.encode()).await;
                self.fail_fast(context, err, started).await;
                return;
            }
        };

        let finalizer = StreamingCompletionFinalizer::new(
            self.output_guard_stages.clone(),
            self.config.boundaries.clone(),
            self.conversation.clone(),
            self.after_complete_hooks.clone(),
            self.metrics.clone(),
        );

        finalizer
            .finalize(context, &session, &user_msg, outcome.collected_content, outcome.last_iteration_content, started, &sender)
            .await;
    }
}
