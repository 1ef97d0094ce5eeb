//! pmath-core demo driver
//!
//! Builds a kernel, binds a few arithmetic natives the way a host library
//! would, and evaluates built-in demo programs. There is no parser, so the
//! programs are constructed in Rust.

use std::env;
use std::process;

use pmath_core::backend::*;
use pmath_core::{init_tracing, EvalConfig};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_usage() {
    eprintln!("pmath-core v{}", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    pmath-core [OPTIONS] [DEMO...]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -h, --help             Print this help message");
    eprintln!("    -v, --version          Print version information");
    eprintln!("    -c, --config <FILE>    Load evaluator settings from a TOML file");
    eprintln!("    -l, --list             List the available demos");
    eprintln!();
    eprintln!("DEMOS:");
    for (name, about, _) in DEMOS {
        eprintln!("    {:<12} {}", name, about);
    }
    eprintln!();
    eprintln!("Without DEMO arguments every demo runs. Set PMATH_LOG=pmath_core=debug for tracing.");
}

struct Options {
    config: Option<String>,
    demos: Vec<String>,
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();
    let mut config = None;
    let mut demos = Vec::new();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "-v" | "--version" => {
                println!("pmath-core {}", VERSION);
                process::exit(0);
            }
            "-l" | "--list" => {
                for (name, about, _) in DEMOS {
                    println!("{:<12} {}", name, about);
                }
                process::exit(0);
            }
            "-c" | "--config" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing file after --config".to_string());
                }
                config = Some(args[i].clone());
            }
            arg if arg.starts_with('-') => return Err(format!("Unknown option: {}", arg)),
            name => {
                if !DEMOS.iter().any(|(n, _, _)| *n == name) {
                    return Err(format!("Unknown demo: {}", name));
                }
                demos.push(name.to_string());
            }
        }
        i += 1;
    }
    Ok(Options { config, demos })
}

// Host arithmetic

fn numeric_fold(
    call: &Expr,
    unit: i64,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> NativeResult {
    if let [single] = call.args() {
        return Ok(Some(single.clone()));
    }
    let (numbers, rest): (Vec<&Object>, Vec<&Object>) = call.args().iter().partition(|a| a.is_type(TypeMask::NUMBER));
    if numbers.len() < 2 && !numbers.iter().any(|n| **n == Object::Integer(unit)) {
        return Ok(None);
    }

    let mut int_acc = Some(unit);
    let mut float_acc = unit as f64;
    let mut inexact = false;
    for n in numbers {
        match n {
            Object::Integer(i) => {
                int_acc = int_acc.and_then(|acc| int_op(acc, *i));
                float_acc = float_op(float_acc, *i as f64);
            }
            Object::Float(x) => {
                inexact = true;
                float_acc = float_op(float_acc, *x);
            }
            _ => {}
        }
    }
    let number = match int_acc {
        Some(i) if !inexact => Object::Integer(i),
        _ => Object::Float(float_acc),
    };

    let mut items: Vec<Object> = Vec::with_capacity(rest.len() + 1);
    if number != Object::Integer(unit) || rest.is_empty() {
        items.push(number);
    }
    items.extend(rest.into_iter().cloned());
    Ok(Some(match items.len() {
        1 => items.remove(0),
        _ => Object::call(call.head().clone(), items),
    }))
}

fn compare(call: &Expr, sys: &SystemSymbols, ord: std::cmp::Ordering) -> NativeResult {
    match call.args() {
        [a, b] if a.is_type(TypeMask::NUMBER) && b.is_type(TypeMask::NUMBER) => Ok(Some(sys.boolean(a.cmp(b) == ord))),
        _ => Ok(None),
    }
}

fn install_arithmetic(kernel: &Kernel) -> Result<(), EvalError> {
    let numeric = Attributes::FLAT | Attributes::ORDERLESS | Attributes::LISTABLE | Attributes::NUMERIC_FUNCTION;
    let plus = kernel.symbol("Plus");
    let times = kernel.symbol("Times");
    kernel.set_attributes(&plus, numeric)?;
    kernel.set_attributes(&times, numeric)?;
    kernel.register(&plus, CodeUsage::DownCall, |_: &ThreadContext, call: &Expr| {
        numeric_fold(call, 0, i64::checked_add, |a, b| a + b)
    });
    kernel.register(&times, CodeUsage::DownCall, |_: &ThreadContext, call: &Expr| {
        numeric_fold(call, 1, i64::checked_mul, |a, b| a * b)
    });
    let less = kernel.symbol("Less");
    let greater = kernel.symbol("Greater");
    kernel.register(&less, CodeUsage::DownCall, |ctx: &ThreadContext, call: &Expr| {
        compare(call, ctx.kernel().system(), std::cmp::Ordering::Less)
    });
    kernel.register(&greater, CodeUsage::DownCall, |ctx: &ThreadContext, call: &Expr| {
        compare(call, ctx.kernel().system(), std::cmp::Ordering::Greater)
    });
    Ok(())
}

// Demos

type Demo = fn(&Kernel, &ThreadContext) -> EvalResult<Vec<(String, Object)>>;

const DEMOS: [(&str, &str, Demo); 5] = [
    ("factorial", "recursive down rules with a conditioned base case", demo_factorial),
    ("flat", "associative matching of a Flat head", demo_flat),
    ("orderless", "commutative matching and canonical order", demo_orderless),
    ("gather", "Gather/Emit collecting tagged values", demo_gather),
    ("parallel", "parallel evaluation on worker contexts", demo_parallel),
];

fn app(head: &Symbol, args: Vec<Object>) -> Object {
    Object::call(head, args)
}

fn demo_factorial(k: &Kernel, ctx: &ThreadContext) -> EvalResult<Vec<(String, Object)>> {
    let sys = k.system();
    let fact = k.symbol("fact");
    let n = k.symbol("n");
    let (times, plus, greater) = (k.symbol("Times"), k.symbol("Plus"), k.symbol("Greater"));

    // fact(0) = 1
    ctx.assign(app(&fact, vec![Object::Integer(0)]), Object::Integer(1))?;
    // fact(n_Integer /; n > 0) := n * fact(n - 1)
    let lhs = app(
        &fact,
        vec![sys.condition(sys.named_blank_of(&n, &sys.integer), app(&greater, vec![Object::from(&n), Object::Integer(0)]))],
    );
    let rhs = app(
        &times,
        vec![Object::from(&n), app(&fact, vec![app(&plus, vec![Object::from(&n), Object::Integer(-1)])])],
    );
    ctx.assign_delayed(lhs, rhs)?;

    let mut out = Vec::new();
    for i in [5, 10, 20] {
        let e = app(&fact, vec![Object::Integer(i)]);
        out.push((e.to_string(), ctx.evaluate(e)?));
    }
    let symbolic = app(&fact, vec![Object::from("a")]);
    out.push((symbolic.to_string(), ctx.evaluate(symbolic.clone())?));
    Ok(out)
}

fn demo_flat(k: &Kernel, ctx: &ThreadContext) -> EvalResult<Vec<(String, Object)>> {
    let sys = k.system();
    let cat = k.symbol("cat");
    let (x, y) = (k.symbol("x"), k.symbol("y"));
    let (a, b, c) = (k.symbol("a"), k.symbol("b"), k.symbol("c"));
    k.set_attributes(&cat, Attributes::FLAT)?;

    let subject = app(&cat, vec![Object::from(&a), Object::from(&b), Object::from(&c)]);
    let pattern = app(&cat, vec![sys.named_blank(&x), sys.named_blank_null_sequence(&y)]);
    let mut out = Vec::new();
    if let Some(bindings) = match_pattern(ctx, &subject, &pattern)? {
        for (name, value) in bindings.iter() {
            out.push((format!("{} /. {} binds {}", subject, pattern, name), value.clone()));
        }
    }

    // cat(a, b) -> "ab" rewrites the pair inside a longer call
    ctx.assign_delayed(app(&cat, vec![Object::from(&a), Object::from(&b)]), Object::from("ab"))?;
    let longer = app(&cat, vec![Object::from(&c), Object::from(&a), Object::from(&b), Object::from(&c)]);
    out.push((longer.to_string(), ctx.evaluate(longer.clone())?));
    Ok(out)
}

fn demo_orderless(k: &Kernel, ctx: &ThreadContext) -> EvalResult<Vec<(String, Object)>> {
    let sys = k.system();
    let pair = k.symbol("pair");
    let x = k.symbol("x");
    k.set_attributes(&pair, Attributes::ORDERLESS)?;
    // pair(x_Integer, _String) := x
    let lhs = app(&pair, vec![sys.named_blank_of(&x, &sys.integer), sys.blank_of(&sys.string)]);
    ctx.assign_delayed(lhs, Object::from(&x))?;

    let mut out = Vec::new();
    for e in [
        app(&pair, vec![Object::from("s"), Object::Integer(7)]),
        app(&pair, vec![Object::Integer(7), Object::from("s")]),
        app(&pair, vec![Object::from("z"), Object::Float(1.5)]),
    ] {
        out.push((e.to_string(), ctx.evaluate(e.clone())?));
    }
    Ok(out)
}

fn demo_gather(k: &Kernel, ctx: &ThreadContext) -> EvalResult<Vec<(String, Object)>> {
    let sys = k.system();
    let emits = (1..=4)
        .map(|i| {
            let tag = if i % 2 == 0 { "even" } else { "odd" };
            Object::call(&sys.emit, vec![Object::Integer(i), Object::from(tag)])
        })
        .collect();
    let body = sys.list(emits);
    let e = Object::call(&sys.gather, vec![body, Object::from("even")]);
    Ok(vec![(e.to_string(), ctx.evaluate(e.clone())?)])
}

fn demo_parallel(k: &Kernel, ctx: &ThreadContext) -> EvalResult<Vec<(String, Object)>> {
    let fact = k.symbol("fact");
    if fact.rules_snapshot(RuleCacheKind::Down).is_none() {
        demo_factorial(k, ctx)?;
    }
    let items: Vec<Object> = (1..=8).map(|i| Object::call(&fact, vec![Object::Integer(i)])).collect();
    let results = ctx.parallel_map(&items)?;
    let spawned = ctx.spawn_task(Object::call(&fact, vec![Object::Integer(12)])).wait()?;
    let mut out: Vec<_> = items.iter().map(ToString::to_string).zip(results).collect();
    out.push(("fact(12) on the pool".to_string(), spawned));
    Ok(out)
}

fn main() {
    let options = match parse_args() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            process::exit(1);
        }
    };

    let config = match &options.config {
        Some(path) => EvalConfig::load(path),
        None => EvalConfig::from_env(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    init_tracing(&config.logging);

    let kernel = Kernel::new(config);
    if let Err(e) = install_arithmetic(&kernel) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
    let ctx = kernel.root_context();

    let mut failed = false;
    for (name, about, demo) in DEMOS {
        if !options.demos.is_empty() && !options.demos.iter().any(|d| d == name) {
            continue;
        }
        println!("== {} ({})", name, about);
        match demo(&kernel, &ctx) {
            Ok(lines) => {
                for (input, output) in lines {
                    println!("  {}  =>  {}", input, output);
                }
            }
            Err(e) => {
                eprintln!("  Error: {}", e);
                failed = true;
            }
        }
    }
    if failed {
        process::exit(1);
    }
}
