use indexfs::FileSystem;

const HELP: &str = "s: superblock, b [N]: bitmap or block N, d [N]: first N blocks, \
f: free blocks, i N: index block N, l [dir]: list, c: check, q: quit";

fn prompt(separator: &str) -> Option<Vec<String>> {
    use std::io::Write;
    let mut line = String::new();
    print!("{separator}");
    std::io::stdout().flush().ok()?;
    match std::io::stdin().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.split_whitespace().map(str::to_string).collect()),
    }
}

enum Flow {
    Continue,
    Quit,
}

fn execute(fs: &mut FileSystem, cmd: &[String]) -> Result<Flow, Box<dyn std::error::Error>> {
    if cmd.is_empty() {
        return Ok(Flow::Continue);
    }
    match cmd[0].as_str() {
        "s" => println!["{}", fs.superblock()],
        "b" => {
            if cmd.len() == 2 {
                println!["{}", fs.read_block(cmd[1].parse()?)?];
            } else {
                println!["{}", fs.bitmap()]
            }
        }
        "d" => {
            let count = match cmd.get(1) {
                Some(count) => count.parse()?,
                None => fs.superblock().total_blocks,
            };
            for block in fs.leading_blocks(count)? {
                println!["{block}"];
            }
        }
        "f" => println!["{:?}", fs.free_block_list()],
        "i" if cmd.len() == 2 => println!["{}", fs.read_index_block(cmd[1].parse()?)?],
        "l" => {
            let dir = cmd.get(1).map(String::as_str).unwrap_or("/");
            for entry in fs.list(dir)? {
                println!["{}", entry?];
            }
        }
        "c" => {
            fs.check()?;
            println!["ok"];
        }
        "q" => return Ok(Flow::Quit),
        _ => println!["{HELP}"],
    }
    Ok(Flow::Continue)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let image = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/tmp/indexfs.img".to_owned());
    let mut fs = FileSystem::mount_image(&image)?;
    while let Some(cmd) = prompt(">> ") {
        match execute(&mut fs, &cmd) {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(e) => eprintln!("{e}"),
        }
    }
    Ok(())
}
