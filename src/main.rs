use std::path::PathBuf;

use clap::{Parser, Subcommand};
use indexfs::structs::{FileKind, DEFAULT_BLOCK_SIZE};
use indexfs::FileSystem;

/// Manipulate an indexfs volume stored in a flat image file
#[derive(Parser, Debug, PartialEq)]
#[command(author, version, about)]
struct Cli {
    /// Path of the volume image
    #[arg(short, long)]
    image: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Create or truncate the image and lay out an empty volume
    Format {
        #[arg(short, long)]
        blocks: u32,
        #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
        block_size: u32,
    },
    /// Create an empty file, or a directory with --dir
    Create {
        path: String,
        #[arg(short, long)]
        dir: bool,
    },
    /// Write text, or the contents of a host file, into a file
    Write {
        path: String,
        #[arg(required_unless_present = "from")]
        text: Option<String>,
        #[arg(short, long, conflicts_with = "text")]
        from: Option<PathBuf>,
        #[arg(short, long, default_value_t = 0)]
        offset: u64,
    },
    /// Print file contents
    Read {
        path: String,
        #[arg(short, long, default_value_t = 0)]
        offset: u64,
        /// Defaults to the rest of the file
        #[arg(short, long)]
        length: Option<u64>,
    },
    /// Remove a file or an empty directory
    Delete { path: String },
    /// List a directory, root by default
    List {
        #[arg(default_value = "/")]
        dir: String,
    },
    /// Show one directory entry
    Stat { path: String },
    Superblock,
    /// Print the allocation bitmap
    Bitmap,
    /// Print ids of free blocks
    Free,
    /// Verify volume consistency
    Check,
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Command::Format { blocks, block_size } = cli.command {
        let fs = FileSystem::format_image(&cli.image, blocks, block_size)?;
        println!["{}", fs.superblock()];
        return Ok(());
    }
    let mut fs = FileSystem::mount_image(&cli.image)?;
    match cli.command {
        Command::Format { .. } => {}
        Command::Create { path, dir } => {
            let kind = if dir {
                FileKind::Directory
            } else {
                FileKind::RegularFile
            };
            println!["{}", fs.create(&path, kind)?];
        }
        Command::Write {
            path,
            text,
            from,
            offset,
        } => {
            let data = match (text, from) {
                (_, Some(from)) => std::fs::read(from)?,
                (Some(text), None) => text.into_bytes(),
                (None, None) => Vec::new(),
            };
            fs.write(&path, offset, &data)?;
        }
        Command::Read {
            path,
            offset,
            length,
        } => {
            let length = match length {
                Some(length) => length,
                None => (fs.stat(&path)?.size() as u64).saturating_sub(offset),
            };
            let data = fs.read(&path, offset, length)?;
            use std::io::Write;
            std::io::stdout().write_all(&data)?;
        }
        Command::Delete { path } => fs.delete(&path)?,
        Command::List { dir } => {
            for entry in fs.list(&dir)? {
                println!["{}", entry?];
            }
        }
        Command::Stat { path } => println!["{}", fs.stat(&path)?],
        Command::Superblock => println!["{}", fs.superblock()],
        Command::Bitmap => println!["{}", fs.bitmap()],
        Command::Free => {
            let free = fs.free_block_list();
            println![
                "{}",
                free.iter()
                    .map(u32::to_string)
                    .collect::<Vec<_>>()
                    .join(" ")
            ];
        }
        Command::Check => {
            fs.check()?;
            println!["ok"];
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    run(Cli::parse())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_format() {
        let cli = Cli::parse_from(["indexfs", "-i", "disk.img", "format", "--blocks", "16"]);
        assert_eq!(
            cli,
            Cli {
                image: PathBuf::from("disk.img"),
                command: Command::Format {
                    blocks: 16,
                    block_size: 512,
                },
            }
        );
    }

    #[test]
    fn parse_write_from_file() {
        let cli = Cli::parse_from([
            "indexfs", "--image", "disk.img", "write", "docs/a", "--from", "host.txt", "-o",
            "10",
        ]);
        assert_eq!(
            cli.command,
            Command::Write {
                path: "docs/a".to_string(),
                text: None,
                from: Some(PathBuf::from("host.txt")),
                offset: 10,
            }
        );
    }

    #[test]
    fn write_requires_data() {
        assert!(Cli::try_parse_from(["indexfs", "-i", "disk.img", "write", "a"]).is_err());
        assert!(Cli::try_parse_from([
            "indexfs", "-i", "disk.img", "write", "a", "text", "--from", "f"
        ])
        .is_err());
    }

    #[test]
    fn parse_list_defaults_to_root() {
        let cli = Cli::parse_from(["indexfs", "-i", "disk.img", "list"]);
        assert_eq!(
            cli.command,
            Command::List {
                dir: "/".to_string()
            }
        );
    }

    #[test]
    fn run_against_image() {
        let image = std::env::temp_dir().join(format!("indexfs-cli-{}.img", std::process::id()));
        let image_arg = image.to_string_lossy().into_owned();
        let invoke = |args: &[&str]| {
            let mut full = vec!["indexfs", "-i", image_arg.as_str()];
            full.extend_from_slice(args);
            run(Cli::parse_from(full))
        };
        invoke(&["format", "--blocks", "32"]).unwrap();
        invoke(&["create", "notes"]).unwrap();
        invoke(&["write", "notes", "hello"]).unwrap();
        invoke(&["check"]).unwrap();
        let mut fs = FileSystem::mount_image(&image).unwrap();
        assert_eq!(fs.read_all("notes").unwrap(), b"hello");
        drop(fs);
        invoke(&["delete", "notes"]).unwrap();
        assert!(invoke(&["stat", "notes"]).is_err());
        std::fs::remove_file(image).unwrap();
    }
}
