//! Recipient token registration.

use console::style;

use crate::{
   Result,
   config::Config,
   notify::{Recipients, Registration},
};

pub fn execute(cfg: &Config, token: &str) -> Result<()> {
   let path = cfg.effective_tokens_file();
   let recipients = Recipients::load(&path)?;

   match recipients.register(token)? {
      Registration::Added => {
         println!("{} {}", style("Registered").green(), style(path.display()).dim());
      },
      Registration::AlreadyPresent => {
         println!("{}", style("Token already registered").yellow());
      },
   }
   Ok(())
}
