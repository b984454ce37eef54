use std::io::{self, Write};

fn main() {
    env_logger::init();

    println!("Gregex REPL");
    println!("Type an empty pattern to exit.");

    loop {
        print!("regex> ");
        io::stdout().flush().unwrap();
        let mut pattern = String::new();
        if io::stdin().read_line(&mut pattern).is_err() {
            println!("Error reading pattern.");
            continue;
        }
        let pattern = pattern.trim();
        if pattern.is_empty() {
            break;
        }

        let re = match gregex::Regex::new(pattern) {
            Ok(regex) => regex,
            Err(e) => {
                println!("Error: {e}");
                continue;
            }
        };

        loop {
            println!("Type exit to go back to the regex prompt.");
            print!("input> ");
            io::stdout().flush().unwrap();
            let mut input = String::new();
            if io::stdin().read_line(&mut input).is_err() {
                println!("Error reading input.");
                continue;
            }
            let input = input.trim();
            if input == "exit" {
                break;
            }
            match re.find_captures(input) {
                Some(caps) => match caps.group0().as_str() {
                    Some(s) => println!("Matched: {s}"),
                    None => println!("Matched (non-UTF8): {:?}", caps.group0().as_bytes()),
                },
                None => println!("No match."),
            }
        }
    }
}
