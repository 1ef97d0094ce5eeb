//! Kernel handle
//!
//! A [`Kernel`] owns everything evaluation threads share: the symbol table,
//! the well-known system symbols, configuration, the abort signal, the
//! message collaborator and the worker pool. The handle is a cheap `Arc`
//! clone, so every [`ThreadContext`] carries one.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use tracing::{debug, trace};

use crate::backend::eval::errors::{EvalError, EvalResult};
use crate::backend::eval::messages::{MessageSink, TracingMessages};
use crate::backend::eval::native::{self, ApproxFunction, CodeUsage, NativeFunction};
use crate::backend::models::Object;
use crate::backend::symbol::{bump_generation, Attributes, Symbol, SymbolTable};
use crate::backend::thread::abort::AbortSignal;
use crate::backend::thread::ThreadContext;
use crate::backend::thread_pool::EvalPool;
use crate::config::EvalConfig;

/// Symbols the core itself interprets
#[derive(Debug, Clone)]
pub struct SystemSymbols {
    pub list: Symbol,
    pub sequence: Symbol,
    pub hold: Symbol,
    pub evaluate: Symbol,
    pub blank: Symbol,
    pub blank_sequence: Symbol,
    pub blank_null_sequence: Symbol,
    pub pattern: Symbol,
    pub condition: Symbol,
    pub pattern_test: Symbol,
    pub alternatives: Symbol,
    pub repeated: Symbol,
    pub optional: Symbol,
    pub hold_pattern: Symbol,
    pub longest: Symbol,
    pub shortest: Symbol,
    pub literal: Symbol,
    pub pattern_sequence: Symbol,
    pub except: Symbol,
    pub default: Symbol,
    pub true_: Symbol,
    pub false_: Symbol,
    pub integer: Symbol,
    pub real: Symbol,
    pub string: Symbol,
    pub symbol: Symbol,
    pub rule: Symbol,
    pub rule_delayed: Symbol,
    pub throw: Symbol,
    pub catch: Symbol,
    pub gather: Symbol,
    pub emit: Symbol,
    pub aborted: Symbol,
    pub general: Symbol,
    pub thread: Symbol,
    pub range: Symbol,
    pub automatic: Symbol,
    pub infinity: Symbol,
}

impl SystemSymbols {
    /// Create (or find) the system symbols in `table` and give them their
    /// attributes. All of them end up Protected.
    pub fn new(table: &SymbolTable) -> Self {
        let s = |name: &str| table.find_or_create(name);
        let sys = SystemSymbols {
            list: s("List"),
            sequence: s("Sequence"),
            hold: s("Hold"),
            evaluate: s("Evaluate"),
            blank: s("Blank"),
            blank_sequence: s("BlankSequence"),
            blank_null_sequence: s("BlankNullSequence"),
            pattern: s("Pattern"),
            condition: s("Condition"),
            pattern_test: s("PatternTest"),
            alternatives: s("Alternatives"),
            repeated: s("Repeated"),
            optional: s("Optional"),
            hold_pattern: s("HoldPattern"),
            longest: s("Longest"),
            shortest: s("Shortest"),
            literal: s("Literal"),
            pattern_sequence: s("PatternSequence"),
            except: s("Except"),
            default: s("Default"),
            true_: s("True"),
            false_: s("False"),
            integer: s("Integer"),
            real: s("Real"),
            string: s("String"),
            symbol: s("Symbol"),
            rule: s("Rule"),
            rule_delayed: s("RuleDelayed"),
            throw: s("Throw"),
            catch: s("Catch"),
            gather: s("Gather"),
            emit: s("Emit"),
            aborted: s("$Aborted"),
            general: s("General"),
            thread: s("Thread"),
            range: s("Range"),
            automatic: s("Automatic"),
            infinity: s("Infinity"),
        };

        let held = [
            (&sys.hold, Attributes::HOLD_ALL),
            (&sys.hold_pattern, Attributes::HOLD_ALL),
            (&sys.condition, Attributes::HOLD_ALL),
            (&sys.rule_delayed, Attributes::HOLD_REST),
            (&sys.pattern, Attributes::HOLD_FIRST),
            (&sys.pattern_test, Attributes::HOLD_REST),
            (&sys.catch, Attributes::HOLD_FIRST),
            (&sys.gather, Attributes::HOLD_FIRST),
            (&sys.literal, Attributes::HOLD_ALL_COMPLETE),
        ];
        for sym in sys.all() {
            sym.store_attributes(Attributes::PROTECTED);
        }
        for (sym, attrs) in held {
            sym.store_attributes(attrs | Attributes::PROTECTED);
        }
        sys
    }

    fn all(&self) -> [&Symbol; 38] {
        [
            &self.list,
            &self.sequence,
            &self.hold,
            &self.evaluate,
            &self.blank,
            &self.blank_sequence,
            &self.blank_null_sequence,
            &self.pattern,
            &self.condition,
            &self.pattern_test,
            &self.alternatives,
            &self.repeated,
            &self.optional,
            &self.hold_pattern,
            &self.longest,
            &self.shortest,
            &self.literal,
            &self.pattern_sequence,
            &self.except,
            &self.default,
            &self.true_,
            &self.false_,
            &self.integer,
            &self.real,
            &self.string,
            &self.symbol,
            &self.rule,
            &self.rule_delayed,
            &self.throw,
            &self.catch,
            &self.gather,
            &self.emit,
            &self.aborted,
            &self.general,
            &self.thread,
            &self.range,
            &self.automatic,
            &self.infinity,
        ]
    }

    /// True for heads the matcher interprets as pattern syntax
    pub fn is_pattern_head(&self, sym: &Symbol) -> bool {
        [
            &self.blank,
            &self.blank_sequence,
            &self.blank_null_sequence,
            &self.pattern,
            &self.condition,
            &self.pattern_test,
            &self.alternatives,
            &self.repeated,
            &self.optional,
            &self.hold_pattern,
            &self.longest,
            &self.shortest,
            &self.literal,
            &self.pattern_sequence,
            &self.except,
        ]
        .contains(&sym)
    }

    /// `True` or `False`
    pub fn boolean(&self, b: bool) -> Object {
        Object::from(if b { &self.true_ } else { &self.false_ })
    }
}

struct KernelShared {
    symbols: SymbolTable,
    system: SystemSymbols,
    config: EvalConfig,
    abort: AbortSignal,
    messages: Box<dyn MessageSink>,
    epoch: Instant,
    pool: OnceLock<EvalPool>,
}

/// Shared evaluation state
#[derive(Clone)]
pub struct Kernel(Arc<KernelShared>);

impl Kernel {
    /// Kernel reporting messages through `tracing`
    pub fn new(config: EvalConfig) -> Kernel {
        Kernel::with_messages(config, TracingMessages)
    }

    pub fn new_default() -> Kernel {
        Kernel::new(EvalConfig::default())
    }

    /// Kernel reporting messages to `sink`
    pub fn with_messages(config: EvalConfig, sink: impl MessageSink + 'static) -> Kernel {
        let symbols = SymbolTable::new();
        let system = SystemSymbols::new(&symbols);
        let kernel = Kernel(Arc::new(KernelShared {
            symbols,
            system,
            config,
            abort: AbortSignal::new(),
            messages: Box::new(sink),
            epoch: Instant::now(),
            pool: OnceLock::new(),
        }));
        native::install_core(&kernel);
        debug!(target: "pmath_core::eval", max_recursion = kernel.config().max_recursion, "kernel created");
        kernel
    }

    /// Find or create the symbol called `name`.
    pub fn symbol(&self, name: &str) -> Symbol {
        self.0.symbols.find_or_create(name)
    }

    /// The symbol called `name`, without creating it
    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        self.0.symbols.lookup(name)
    }

    /// Unregister `sym`, clearing all its definitions.
    ///
    /// Existing handles stay valid but the symbol no longer evaluates; a later
    /// [`Kernel::symbol`] with the same name creates a fresh symbol.
    pub fn remove_symbol(&self, sym: &Symbol) -> bool {
        self.0.symbols.remove(sym)
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.0.symbols
    }

    #[inline]
    pub fn system(&self) -> &SystemSymbols {
        &self.0.system
    }

    #[inline]
    pub fn config(&self) -> &EvalConfig {
        &self.0.config
    }

    /// Ask every evaluation on this kernel to stop at its next safe point.
    pub fn request_abort(&self) {
        debug!(target: "pmath_core::thread", "abort requested");
        self.0.abort.request();
    }

    pub fn clear_abort(&self) {
        self.0.abort.clear();
    }

    #[inline]
    pub fn is_aborting(&self) -> bool {
        self.0.abort.is_set()
    }

    pub(crate) fn abort_signal(&self) -> &AbortSignal {
        &self.0.abort
    }

    /// Nanoseconds since the kernel was created; deadlines are measured on this clock.
    pub(crate) fn elapsed_nanos(&self) -> u64 {
        u64::try_from(self.0.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    /// Report a diagnostic `sym::tag` to the message collaborator.
    pub fn message(&self, sym: &Symbol, tag: &str, args: &[Object]) {
        trace!(target: "pmath_core::messages", symbol = %sym, tag, "message");
        self.0.messages.message(sym, tag, args);
    }

    /// Bind native code to `sym`. It runs when no user rule matched.
    pub fn register(&self, sym: &Symbol, usage: CodeUsage, f: impl NativeFunction + 'static) {
        let f: Arc<dyn NativeFunction> = Arc::new(f);
        {
            let mut code = sym.native_code_mut();
            match usage {
                CodeUsage::DownCall => code.down = Some(f),
                CodeUsage::SubCall => code.sub = Some(f),
                CodeUsage::UpCall => code.up = Some(f),
            }
        }
        bump_generation();
        trace!(target: "pmath_core::eval", symbol = %sym, ?usage, "native code registered");
    }

    /// Bind a numeric approximation callback to `sym`.
    pub fn register_approx(&self, sym: &Symbol, f: impl ApproxFunction + 'static) {
        sym.native_code_mut().approx = Some(Arc::new(f));
        bump_generation();
    }

    /// Change a symbol's attributes.
    pub fn set_attributes(&self, sym: &Symbol, attrs: Attributes) -> EvalResult<()> {
        sym.set_attributes(attrs).map_err(EvalError::from)
    }

    /// A fresh top-level evaluation context
    pub fn root_context(&self) -> ThreadContext {
        ThreadContext::new_root(self.clone())
    }

    /// Worker pool for spawned evaluations, started on first use
    pub fn pool(&self) -> &EvalPool {
        self.0.pool.get_or_init(|| {
            let threads = match self.0.config.worker_threads {
                0 => num_cpus::get(),
                n => n,
            };
            EvalPool::new(threads)
        })
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("symbols", &self.0.symbols.len())
            .field("aborting", &self.is_aborting())
            .finish()
    }
}
