use anyhow::Result;

fn main() -> Result<()> {
    vectorbench_cli::cli::execute()
}
