use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::token::{AccountId, Amount, TokenLedger};

mod token;

fn usage() -> ! {
    eprintln!(
"Usage:
  tokledger create        <state.json> --name=<str> --symbol=<str> --decimals=<N> --supply=<N> --creator=<id>
  tokledger transfer      <state.json> --from=<id> --to=<id> --amount=<N>
  tokledger approve       <state.json> --owner=<id> --spender=<id> --amount=<N>
  tokledger transfer-from <state.json> --spender=<id> --owner=<id> --to=<id> --amount=<N>

  tokledger balance       <state.json> --account=<id>
  tokledger allowance     <state.json> --owner=<id> --spender=<id>
  tokledger info          <state.json>
  tokledger events        <state.json>

Notes:
  - <state.json> holds the full ledger state; mutating commands rewrite it on success
  - amounts are unsigned integers in minimal units (scaled by --decimals)
  - failed operations leave the state file untouched and exit with code 1"
    );
    std::process::exit(1)
}

fn arg_flag(args: &[String], name: &str) -> Option<String> {
    for a in args {
        if let Some(rest) = a.strip_prefix(&format!("--{}=", name)) {
            return Some(rest.to_string());
        }
    }
    None
}

#[inline]
fn require_flag(args: &[String], name: &str) -> String {
    if let Some(v) = arg_flag(args, name) {
        return v;
    }
    eprintln!("error: missing --{name}\n");
    usage();
}

fn amount_flag(args: &[String], name: &str) -> Amount {
    match require_flag(args, name).parse() {
        Ok(v) => v,
        Err(err) => {
            eprintln!("error: invalid --{name}: {err}");
            std::process::exit(2);
        }
    }
}

fn state_path(args: &[String]) -> PathBuf {
    if args.is_empty() {
        usage();
    }
    PathBuf::from(&args[0])
}

fn load_ledger(path: &Path) -> TokenLedger {
    if !path.exists() {
        eprintln!(
            "missing state file {} (run 'tokledger create' first)",
            path.display()
        );
        std::process::exit(2);
    }
    let bytes = fs::read(path).expect("read state file");
    match serde_json::from_slice(&bytes) {
        Ok(ledger) => ledger,
        Err(err) => {
            eprintln!("error: malformed state file {}: {err}", path.display());
            std::process::exit(2);
        }
    }
}

fn save_ledger(path: &Path, ledger: &TokenLedger) {
    let json = serde_json::to_vec_pretty(ledger).expect("encode state");
    fs::write(path, json).expect("write state file");
}

fn print_last_event(ledger: &TokenLedger) {
    if let Some(event) = ledger.events().last() {
        println!("{}", serde_json::to_string(event).expect("encode event"));
    }
}

//==================== Mutating commands ====================//

fn create_cmd(args: &[String]) {
    let path = state_path(args);
    let name = require_flag(args, "name");
    let symbol = require_flag(args, "symbol");
    let decimals: u32 = match require_flag(args, "decimals").parse() {
        Ok(v) => v,
        Err(err) => {
            eprintln!("error: invalid --decimals: {err}");
            std::process::exit(2);
        }
    };
    let supply = amount_flag(args, "supply");
    let creator: AccountId = require_flag(args, "creator");

    let ledger = TokenLedger::new(name, symbol, decimals, supply, creator);
    save_ledger(&path, &ledger);
    eprintln!(
        "created {} ({}) supply={} state_root={}",
        ledger.name(),
        ledger.symbol(),
        ledger.total_supply(),
        hex::encode(ledger.state_root())
    );
}

fn transfer_cmd(args: &[String]) {
    let path = state_path(args);
    let from: AccountId = require_flag(args, "from");
    let to: AccountId = require_flag(args, "to");
    let amount = amount_flag(args, "amount");

    let mut ledger = load_ledger(&path);
    if let Err(err) = ledger.transfer(&from, &to, amount) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
    save_ledger(&path, &ledger);
    print_last_event(&ledger);
}

fn approve_cmd(args: &[String]) {
    let path = state_path(args);
    let owner: AccountId = require_flag(args, "owner");
    let spender: AccountId = require_flag(args, "spender");
    let amount = amount_flag(args, "amount");

    let mut ledger = load_ledger(&path);
    ledger.approve(&owner, &spender, amount);
    save_ledger(&path, &ledger);
    print_last_event(&ledger);
}

fn transfer_from_cmd(args: &[String]) {
    let path = state_path(args);
    let spender: AccountId = require_flag(args, "spender");
    let owner: AccountId = require_flag(args, "owner");
    let to: AccountId = require_flag(args, "to");
    let amount = amount_flag(args, "amount");

    let mut ledger = load_ledger(&path);
    if let Err(err) = ledger.transfer_from(&spender, &owner, &to, amount) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
    save_ledger(&path, &ledger);
    print_last_event(&ledger);
}

//==================== Read-only commands ====================//

fn balance_cmd(args: &[String]) {
    let path = state_path(args);
    let account = require_flag(args, "account");
    let ledger = load_ledger(&path);
    println!("{}", ledger.balance_of(&account));
}

fn allowance_cmd(args: &[String]) {
    let path = state_path(args);
    let owner = require_flag(args, "owner");
    let spender = require_flag(args, "spender");
    let ledger = load_ledger(&path);
    println!("{}", ledger.allowance(&owner, &spender));
}

fn info_cmd(args: &[String]) {
    let path = state_path(args);
    let ledger = load_ledger(&path);
    let info = serde_json::json!({
        "name": ledger.name(),
        "symbol": ledger.symbol(),
        "decimals": ledger.decimals(),
        "total_supply": ledger.total_supply(),
        "events": ledger.events().len(),
        "state_root": hex::encode(ledger.state_root()),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&info).expect("encode info")
    );
}

fn events_cmd(args: &[String]) {
    let path = state_path(args);
    let ledger = load_ledger(&path);
    // One event per line, in emission order.
    for event in ledger.events() {
        println!("{}", serde_json::to_string(event).expect("encode event"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT: Amount = 1_000_000_000_000_000_000;

    #[test]
    fn state_file_survives_successive_commands() {
        let path = env::temp_dir().join(format!(
            "tokledger-state-{}-{:?}.json",
            std::process::id(),
            std::thread::current().id()
        ));

        // create
        let ledger = TokenLedger::new(
            "Test Token".into(),
            "TEST".into(),
            18,
            1_000_000 * UNIT,
            "deployer".into(),
        );
        save_ledger(&path, &ledger);

        // transfer against the reloaded state, then persist again
        let mut reloaded = load_ledger(&path);
        reloaded
            .transfer(&"deployer".into(), &"alice".into(), 100 * UNIT)
            .unwrap();
        reloaded.approve(&"deployer".into(), &"alice".into(), 300 * UNIT);
        save_ledger(&path, &reloaded);

        // the file written with a non-empty event log must load back intact
        let after = load_ledger(&path);
        assert_eq!(after, reloaded);
        assert_eq!(after.balance_of("alice"), 100 * UNIT);
        assert_eq!(after.balance_of("deployer"), 999_900 * UNIT);
        assert_eq!(after.allowance("deployer", "alice"), 300 * UNIT);
        assert_eq!(after.events().len(), 2);

        fs::remove_file(&path).ok();
    }
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        usage();
    }
    let rest = &args[1..];
    match args[0].as_str() {
        "create" => create_cmd(rest),
        "transfer" => transfer_cmd(rest),
        "approve" => approve_cmd(rest),
        "transfer-from" => transfer_from_cmd(rest),
        "balance" => balance_cmd(rest),
        "allowance" => allowance_cmd(rest),
        "info" => info_cmd(rest),
        "events" => events_cmd(rest),
        _ => usage(),
    }
}
