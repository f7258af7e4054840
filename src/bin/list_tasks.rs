use clap::Parser;
use taskq_registry::demo::register_demo_tasks;
use taskq_registry::TaskRegistryBuilder;

#[derive(Parser)]
#[command(author, version, about = "Lists every task name registered with this build", long_about = None)]
struct Args;

fn main() {
    Args::parse();

    let registry = register_demo_tasks(TaskRegistryBuilder::new()).freeze();
    for name in registry.names() {
        println!("{name}");
    }
}
