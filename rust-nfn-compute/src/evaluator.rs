//! Evaluator task: one per computation the forwarder cannot serve from
//! its Content Store.
//!
//! The evaluator decides placement with the ToDataFirst strategy. When
//! it forwards, it emits rewritten Interests and records the originals
//! in the shared rewrite table. When it evaluates locally, it issues
//! one Interest per Name or nested-call parameter, awaits the Contents
//! on its inbound queue, fetches the function body, and dispatches to
//! the registered executor. Its content table dies with the task.

use crate::ast::Ast;
use crate::executor::{code_language, ExecutorRegistry};
use crate::optimizer::ToDataFirstOptimizer;
use crate::parser::NfnParser;
use bytes::Bytes;
use log::{debug, warn};
use rust_nfn_common::name::Name;
use rust_nfn_common::packet::{Content, Interest, NackReason};
use rust_nfn_fwd::tables::{ContentStore, ForwardingInformationBase};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// What an evaluator emits on its outbound queue.
#[derive(Debug, Clone)]
pub enum EvaluatorOutput {
    /// The computation moves toward its data; nothing runs here.
    RewrittenInterests(Vec<Interest>),
    /// A parameter or function body is needed.
    SubInterest(Interest),
    /// The computation finished; this Content answers the original
    /// Interest.
    Result(Content),
    /// The computation failed with the given reason.
    Failed(NackReason),
}

/// A running evaluator: feed resolved Contents into `in_tx`; the task
/// ends on its own once the computation concludes.
pub struct EvaluatorHandle {
    pub in_tx: mpsc::Sender<Content>,
    pub task: JoinHandle<()>,
}

pub struct Evaluator {
    interest: Interest,
    cs: Arc<Mutex<ContentStore>>,
    fib: Arc<Mutex<ForwardingInformationBase>>,
    executors: Arc<ExecutorRegistry>,
    rewrite_table: Arc<Mutex<HashMap<Name, Vec<Name>>>>,
    parser: NfnParser,
    in_rx: mpsc::Receiver<Content>,
    out_tx: mpsc::Sender<EvaluatorOutput>,
    content_table: HashMap<Name, Content>,
    request_table: HashSet<Name>,
}

impl Evaluator {
    pub fn spawn(
        interest: Interest,
        cs: Arc<Mutex<ContentStore>>,
        fib: Arc<Mutex<ForwardingInformationBase>>,
        executors: Arc<ExecutorRegistry>,
        rewrite_table: Arc<Mutex<HashMap<Name, Vec<Name>>>>,
        out_tx: mpsc::Sender<EvaluatorOutput>,
        queue_capacity: usize,
    ) -> EvaluatorHandle {
        let (in_tx, in_rx) = mpsc::channel(queue_capacity);
        let evaluator = Self {
            interest,
            cs,
            fib,
            executors,
            rewrite_table,
            parser: NfnParser::new(),
            in_rx,
            out_tx,
            content_table: HashMap::new(),
            request_table: HashSet::new(),
        };
        let task = tokio::spawn(evaluator.run());
        EvaluatorHandle { in_tx, task }
    }

    async fn run(mut self) {
        let name = self.interest.name.clone();
        match self.evaluate().await {
            Ok(Some(payload)) => {
                let content = Content::new(name, payload);
                let _ = self.out_tx.send(EvaluatorOutput::Result(content)).await;
            }
            Ok(None) => {}
            Err(reason) => {
                warn!("computation {} failed: {}", name, reason);
                let _ = self.out_tx.send(EvaluatorOutput::Failed(reason)).await;
            }
        }
    }

    async fn evaluate(&mut self) -> Result<Option<Bytes>, NackReason> {
        let (expr, prepended) = self
            .parser
            .network_name_to_nfn_str(&self.interest.name)
            .map_err(|_| NackReason::CompException)?;
        let ast = self
            .parser
            .parse(&expr)
            .map_err(|_| NackReason::CompException)?;

        let optimizer = ToDataFirstOptimizer::new(prepended);
        let rewrites = {
            let fib = self.fib.lock().await;
            if optimizer.compute_fwd(&ast, &fib) {
                optimizer.rewrites(&ast, &fib, &self.parser)
            } else {
                Vec::new()
            }
        };
        if !rewrites.is_empty() {
            let mut table = self.rewrite_table.lock().await;
            let mut interests = Vec::with_capacity(rewrites.len());
            for rewritten in rewrites {
                table
                    .entry(rewritten.clone())
                    .or_default()
                    .push(self.interest.name.clone());
                interests.push(Interest::new(rewritten));
            }
            drop(table);
            debug!(
                "forwarding computation {} toward its data",
                self.interest.name
            );
            let _ = self
                .out_tx
                .send(EvaluatorOutput::RewrittenInterests(interests))
                .await;
            return Ok(None);
        }

        self.compute_local(&ast).await.map(Some)
    }

    async fn compute_local(&mut self, ast: &Ast) -> Result<Bytes, NackReason> {
        let Ast::FuncCall { name, params } = ast else {
            // A bare value is not executable.
            return Err(NackReason::CompException);
        };
        let function_name = Name::from_string(name);

        enum Param {
            Requested(Name),
            Inline(Bytes),
        }

        let mut resolved = Vec::with_capacity(params.len());
        for param in params {
            match param {
                Ast::Name(name) => {
                    self.request_data(name.clone()).await;
                    resolved.push(Param::Requested(name.clone()));
                }
                Ast::FuncCall { .. } => {
                    let sub = self
                        .parser
                        .nfn_str_to_network_name(&param.to_string(), None);
                    self.request_data(sub.clone()).await;
                    resolved.push(Param::Requested(sub));
                }
                Ast::Str(s) => resolved.push(Param::Inline(Bytes::from(s.clone().into_bytes()))),
                Ast::Int(i) => resolved.push(Param::Inline(Bytes::from(i.to_string().into_bytes()))),
                Ast::Float(x) => {
                    resolved.push(Param::Inline(Bytes::from(x.to_string().into_bytes())))
                }
                Ast::Var(_) => return Err(NackReason::CompParamUnavailable),
            }
        }
        self.request_data(function_name.clone()).await;
        self.await_data().await?;

        let params: Vec<Bytes> = resolved
            .into_iter()
            .map(|param| match param {
                Param::Requested(name) => self
                    .content_table
                    .get(&name)
                    .map(|content| content.payload.clone())
                    .ok_or(NackReason::CompParamUnavailable),
                Param::Inline(bytes) => Ok(bytes),
            })
            .collect::<Result<_, _>>()?;

        let code = self
            .content_table
            .get(&function_name)
            .ok_or(NackReason::CompParamUnavailable)?;
        let code = String::from_utf8(code.payload.to_vec())
            .map_err(|_| NackReason::CompException)?;
        let language = code_language(&code);
        let executor = self
            .executors
            .get(language)
            .ok_or(NackReason::CompException)?;
        executor
            .execute(&code, &params)
            .map_err(|_| NackReason::CompException)
    }

    /// Requests `name` from the network, short-circuiting through the
    /// Content Store.
    async fn request_data(&mut self, name: Name) {
        if self.content_table.contains_key(&name) || !self.request_table.insert(name.clone()) {
            return;
        }
        if let Some(content) = self.cs.lock().await.find(&name) {
            self.content_table.insert(name, content);
            return;
        }
        let _ = self
            .out_tx
            .send(EvaluatorOutput::SubInterest(Interest::new(name)))
            .await;
    }

    /// Blocks on the inbound queue until every requested name has
    /// arrived. Contents for names never requested are dropped.
    async fn await_data(&mut self) -> Result<(), NackReason> {
        while !self
            .request_table
            .iter()
            .all(|name| self.content_table.contains_key(name))
        {
            match self.in_rx.recv().await {
                Some(content) => {
                    if self.request_table.contains(&content.name) {
                        self.content_table.insert(content.name.clone(), content);
                    } else {
                        debug!("dropping unsolicited {}", content.name);
                    }
                }
                None => return Err(NackReason::CompTerminated),
            }
        }
        Ok(())
    }
}
