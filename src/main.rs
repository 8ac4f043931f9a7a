use anyhow::Result;

fn main() -> Result<()> {
    qsmin::command_line::procedures::main()
}
