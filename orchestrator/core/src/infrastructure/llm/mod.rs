// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Infrastructure - Anti-Corruption Layer Implementations
//
// Provider adapters translate between our domain interface and external APIs;
// the agent invoker turns any provider into an AgentInvoker.

pub mod openai;
pub mod agent_invoker;

pub use agent_invoker::LlmAgentInvoker;
pub use openai::OpenAIAdapter;
